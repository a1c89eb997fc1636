use serde::{Deserialize, Serialize};

/// Column name plus the declared type name as PostgreSQL reports it
/// (`integer`, `character varying(255)`, `jsonb`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }

    /// Lowercased type name without a length/precision modifier,
    /// e.g. `numeric(10,2)` -> `numeric`.
    pub fn base_type(&self) -> String {
        base_type_name(&self.data_type)
    }
}

pub fn base_type_name(data_type: &str) -> String {
    let base = match data_type.find('(') {
        Some(idx) => &data_type[..idx],
        None => data_type,
    };
    base.trim().to_lowercase()
}

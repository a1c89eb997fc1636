use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query_result::Row;

/// A client-side edit waiting to be written back. Row indexes refer to the
/// position of the row in the result set the edit was made against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RowChange {
    Update {
        row_index: usize,
        original: Row,
        updated: Row,
        modified_columns: Vec<String>,
    },
    Insert {
        values: Row,
    },
    Delete {
        row_index: usize,
        original: Row,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowChangeKind {
    Update,
    Insert,
    Delete,
}

impl fmt::Display for RowChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Update => "Update",
            Self::Insert => "Insert",
            Self::Delete => "Delete",
        })
    }
}

impl RowChange {
    pub fn kind(&self) -> RowChangeKind {
        match self {
            Self::Update { .. } => RowChangeKind::Update,
            Self::Insert { .. } => RowChangeKind::Insert,
            Self::Delete { .. } => RowChangeKind::Delete,
        }
    }

    /// Original row position; inserts have none.
    pub fn row_index(&self) -> Option<usize> {
        match self {
            Self::Update { row_index, .. } | Self::Delete { row_index, .. } => Some(*row_index),
            Self::Insert { .. } => None,
        }
    }
}

/// Outcome of writing a batch of [`RowChange`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationResult {
    pub success: bool,
    pub affected_row_count: u64,
    /// One entry per failed change, in execution order.
    pub errors: Vec<String>,
    /// Executed statements with literal values substituted, for display only.
    pub executed_sql: Vec<String>,
}

impl ModificationResult {
    /// A batch rejected before any statement ran.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            affected_row_count: 0,
            errors: vec![message.into()],
            executed_sql: Vec::new(),
        }
    }
}

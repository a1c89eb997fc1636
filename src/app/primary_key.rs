//! Primary-key resolution for row editing.
//!
//! Declared keys come from the catalog. When a table declares none, a
//! best-effort guess is offered from column names; a guess is never applied
//! without the user confirming it.

use tracing::debug;

use crate::domain::TableName;
use crate::domain::connection::ConnectionId;
use crate::ports::{DbError, MetadataProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyConfidence {
    /// Declared by the table's primary-key constraint
    Declared,
    /// Column named `id` or `pk`
    Likely,
    /// A lone `*_id` column
    Weak,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub columns: Vec<String>,
    pub confidence: KeyConfidence,
    /// The guessed column looks like a reference to another table.
    pub possibly_foreign: bool,
}

impl PrimaryKey {
    fn declared(columns: Vec<String>) -> Self {
        Self {
            columns,
            confidence: KeyConfidence::Declared,
            possibly_foreign: false,
        }
    }

    pub fn needs_confirmation(&self) -> bool {
        self.confidence != KeyConfidence::Declared
    }
}

fn singular(name: &str) -> &str {
    name.strip_suffix('s').unwrap_or(name)
}

/// Guesses a key from column names: `id`, then `pk`, then a single `*_id`
/// column. A `*_id` column whose prefix does not name `table` is flagged as
/// possibly a foreign key (`customer_id` on `orders`).
pub fn infer_primary_key(table: &TableName, columns: &[String]) -> Option<PrimaryKey> {
    let named = |wanted: &str| columns.iter().find(|c| c.eq_ignore_ascii_case(wanted));

    if let Some(column) = named("id").or_else(|| named("pk")) {
        return Some(PrimaryKey {
            columns: vec![column.clone()],
            confidence: KeyConfidence::Likely,
            possibly_foreign: false,
        });
    }

    let suffixed: Vec<&String> = columns
        .iter()
        .filter(|c| {
            c.len() > 3
                && c.is_char_boundary(c.len() - 3)
                && c[c.len() - 3..].eq_ignore_ascii_case("_id")
        })
        .collect();
    let [column] = suffixed.as_slice() else {
        return None;
    };

    let prefix = column[..column.len() - 3].to_lowercase();
    let table_name = table.name.to_lowercase();
    Some(PrimaryKey {
        columns: vec![(*column).clone()],
        confidence: KeyConfidence::Weak,
        possibly_foreign: singular(&table_name) != prefix && table_name != prefix,
    })
}

/// The declared key when there is one, otherwise a guess.
pub async fn resolve_primary_key(
    metadata: &dyn MetadataProvider,
    connection: &ConnectionId,
    table: &TableName,
    columns: &[String],
) -> Result<Option<PrimaryKey>, DbError> {
    let declared = metadata.primary_key_columns(connection, table).await?;
    if !declared.is_empty() {
        return Ok(Some(PrimaryKey::declared(declared)));
    }

    let guess = infer_primary_key(table, columns);
    debug!(table = %table, ?guess, "no declared primary key");
    Ok(guess)
}

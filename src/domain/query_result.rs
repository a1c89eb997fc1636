use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error text carried by a result whose execution was cancelled by the user.
/// Callers compare against it (or use [`QueryResult::is_cancelled`]) to avoid
/// surfacing a cancellation as a failure.
pub const CANCELLED_MESSAGE: &str = "Query cancelled by user";

/// One output record, keyed by column name.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    pub name: String,
    /// Best-effort type name; `unknown` when the type id is not recognised.
    pub type_name: String,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Represents the result of a SQL statement execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// The SQL text that was sent to the server
    pub query: String,
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Row>,
    /// Rows returned, or rows affected for statements without a result set
    pub row_count: u64,
    pub duration_ms: u64,
    pub executed_at: SystemTime,
    pub error: Option<String>,
}

impl QueryResult {
    pub fn success(
        query: String,
        columns: Vec<ResultColumn>,
        rows: Vec<Row>,
        rows_affected: Option<u64>,
        duration_ms: u64,
    ) -> Self {
        let row_count = if columns.is_empty() {
            rows_affected.unwrap_or(0)
        } else {
            rows.len() as u64
        };
        Self {
            query,
            columns,
            rows,
            row_count,
            duration_ms,
            executed_at: SystemTime::now(),
            error: None,
        }
    }

    pub fn error(query: String, error: String, duration_ms: u64) -> Self {
        Self {
            query,
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            duration_ms,
            executed_at: SystemTime::now(),
            error: Some(error),
        }
    }

    pub fn cancelled(query: String, duration_ms: u64) -> Self {
        Self::error(query, CANCELLED_MESSAGE.to_string(), duration_ms)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some() && !self.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.as_deref() == Some(CANCELLED_MESSAGE)
    }
}

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::connection::ConnectionId;

/// One entry of the in-memory execution log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHistoryItem {
    pub id: Uuid,
    pub sql: String,
    pub connection_id: ConnectionId,
    pub timestamp: SystemTime,
    pub duration_ms: u64,
    pub row_count: u64,
    pub error: Option<String>,
}

impl QueryHistoryItem {
    pub fn new(
        sql: impl Into<String>,
        connection_id: ConnectionId,
        duration_ms: u64,
        row_count: u64,
        error: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sql: sql.into(),
            connection_id,
            timestamp: SystemTime::now(),
            duration_ms,
            row_count,
            error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::CANCELLED_MESSAGE;
use crate::domain::connection::ConnectionId;

/// Driver messages that mean the server interrupted a statement on request.
const CANCELLATION_SIGNATURES: &[&str] = &[
    "canceling statement due to user request",
    "canceled by user",
    "cancelled by user",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("{0}")]
    Query(String),
    #[error("{}", CANCELLED_MESSAGE)]
    Cancelled,
}

impl DbError {
    /// True for explicit cancellations and for driver errors whose text
    /// matches a known cancellation signature.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Query(message) | Self::Connection(message) => {
                let message = message.to_lowercase();
                CANCELLATION_SIGNATURES
                    .iter()
                    .any(|signature| message.contains(signature))
            }
            Self::UnknownConnection(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    pub name: String,
    /// Server type id; 0 when the driver could not describe the column
    pub type_oid: u32,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, type_oid: u32) -> Self {
        Self {
            name: name.into(),
            type_oid,
        }
    }
}

/// Result set as returned by a session, before it is keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultSet {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<Vec<Value>>,
    pub rows_affected: Option<u64>,
}

/// One dedicated server session. Dropping the session releases it.
#[async_trait]
pub trait DbSession: Send {
    /// Server-side process id of this session, the target of cancel requests.
    async fn backend_pid(&mut self) -> Result<i32, DbError>;

    /// Runs SQL text verbatim.
    async fn query(&mut self, sql: &str) -> Result<RawResultSet, DbError>;

    /// Runs a parameterised statement and returns the affected row count.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError>;
}

#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn acquire(&self, connection: &ConnectionId) -> Result<Box<dyn DbSession>, DbError>;

    /// Asks the server, over a separate session, to cancel whatever
    /// `backend_pid` is running. `Ok(false)` when the server found nothing to
    /// cancel.
    async fn cancel_backend(
        &self,
        connection: &ConnectionId,
        backend_pid: i32,
    ) -> Result<bool, DbError>;

    /// Human-readable, password-free label for error messages.
    fn describe(&self, connection: &ConnectionId) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DbError::Cancelled, true)]
    #[case(DbError::Query("ERROR: canceling statement due to user request".into()), true)]
    #[case(DbError::Query("Query Cancelled By User".into()), true)]
    #[case(DbError::Query("canceling statement due to statement timeout".into()), false)]
    #[case(DbError::Query("relation \"t\" does not exist".into()), false)]
    #[case(DbError::UnknownConnection(ConnectionId::from_string("x")), false)]
    fn recognises_cancellation_signatures(#[case] error: DbError, #[case] expected: bool) {
        assert_eq!(error.is_cancellation(), expected);
    }

    #[test]
    fn cancelled_displays_designated_message() {
        assert_eq!(DbError::Cancelled.to_string(), CANCELLED_MESSAGE);
    }
}

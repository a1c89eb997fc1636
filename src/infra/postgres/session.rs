use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio_postgres::Client;
use tokio_postgres::types::ToSql;
use tracing::debug;

use crate::app::ports::{DbError, DbSession, RawColumn, RawResultSet};
use crate::domain::connection::ConnectionId;

use super::decode::{collect_result_set, map_error};
use super::params::TextParam;

const MAX_IDLE_PER_CONNECTION: usize = 4;

/// Idle clients kept per connection for reuse.
pub(super) type IdlePool = Arc<Mutex<HashMap<ConnectionId, Vec<Client>>>>;

pub(super) fn lock_pool(pool: &IdlePool) -> MutexGuard<'_, HashMap<ConnectionId, Vec<Client>>> {
    pool.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A checked-out client. Dropping it hands the client back to the idle pool,
/// unless a request was still in flight or the connection has closed.
pub struct PgSession {
    client: Option<Client>,
    connection: ConnectionId,
    idle: IdlePool,
    backend_pid: Option<i32>,
    in_flight: bool,
}

impl PgSession {
    pub(super) fn new(client: Client, connection: ConnectionId, idle: IdlePool) -> Self {
        Self {
            client: Some(client),
            connection,
            idle,
            backend_pid: None,
            in_flight: false,
        }
    }

    pub(super) fn client(&self) -> Result<&Client, DbError> {
        self.client
            .as_ref()
            .ok_or_else(|| DbError::Connection("session already released".to_string()))
    }
}

#[async_trait]
impl DbSession for PgSession {
    async fn backend_pid(&mut self) -> Result<i32, DbError> {
        if let Some(pid) = self.backend_pid {
            return Ok(pid);
        }
        let row = self
            .client()?
            .query_one("SELECT pg_backend_pid()", &[])
            .await
            .map_err(map_error)?;
        let pid: i32 = row.try_get(0).map_err(map_error)?;
        self.backend_pid = Some(pid);
        Ok(pid)
    }

    async fn query(&mut self, sql: &str) -> Result<RawResultSet, DbError> {
        self.in_flight = true;
        let client = self.client()?;

        // Describing gives column type ids; multi-statement text cannot be described
        let described = match client.prepare(sql).await {
            Ok(statement) => Some(
                statement
                    .columns()
                    .iter()
                    .map(|c| RawColumn::new(c.name(), c.type_().oid()))
                    .collect(),
            ),
            Err(e) => match map_error(e) {
                DbError::Cancelled => {
                    self.in_flight = false;
                    return Err(DbError::Cancelled);
                }
                other => {
                    debug!(error = %other, "statement describe failed; column types unknown");
                    None
                }
            },
        };

        let messages = client.simple_query(sql).await;
        self.in_flight = false;
        Ok(collect_result_set(described, messages.map_err(map_error)?))
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let params: Vec<TextParam> = params.iter().map(TextParam::from_value).collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        self.in_flight = true;
        let affected = self.client()?.execute(sql, &refs).await;
        self.in_flight = false;
        affected.map_err(map_error)
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        if self.in_flight || client.is_closed() {
            debug!(connection = %self.connection, "discarding session");
            return;
        }
        let mut idle = lock_pool(&self.idle);
        let clients = idle.entry(self.connection.clone()).or_default();
        if clients.len() < MAX_IDLE_PER_CONNECTION {
            clients.push(client);
        }
    }
}

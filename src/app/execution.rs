//! Execution orchestrator: runs one statement at a time on a dedicated
//! session, supports server-side cancellation and records history.
//!
//! Lifecycle of one call to [`QueryOrchestrator::execute`]:
//! `Idle -> Acquiring -> Running -> {Completed | Failed | Cancelled} -> Idle`.
//! The session is released and the active query cleared on every exit path,
//! including early returns and a dropped future.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::connection::ConnectionId;
use crate::domain::pg_type::type_name;
use crate::domain::{QueryHistoryItem, QueryResult, ResultColumn, Row};
use crate::ports::{ConnectionProvider, DbError, RawResultSet};
use crate::query_history::QueryHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Acquiring,
    Running,
}

impl QueryStatus {
    /// The "query running" flag: true from acquire until the session is
    /// released.
    pub fn is_active(self) -> bool {
        self != Self::Idle
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("A query is already running")]
    Busy,
    #[error("Could not connect to {connection}: {source}")]
    Acquire {
        connection: String,
        #[source]
        source: DbError,
    },
    #[error("Query failed on {connection}: {message}")]
    Failed {
        connection: String,
        message: String,
        /// Result carrying the error, already recorded in history
        result: Box<QueryResult>,
    },
}

#[derive(Debug, Clone)]
struct ActiveQuery {
    connection: ConnectionId,
    backend_pid: i32,
    cancelled: bool,
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Idle,
    Acquiring {
        cancelled: bool,
    },
    Running(ActiveQuery),
}

pub struct QueryOrchestrator {
    provider: Arc<dyn ConnectionProvider>,
    history: Arc<QueryHistory>,
    slot: Mutex<Slot>,
    status: watch::Sender<QueryStatus>,
}

/// Resets the slot to `Idle` when an execution ends, however it ends.
struct SlotGuard<'a> {
    orchestrator: &'a QueryOrchestrator,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        *self.orchestrator.lock_slot() = Slot::Idle;
        self.orchestrator.status.send_replace(QueryStatus::Idle);
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn build_result(sql: &str, raw: RawResultSet, duration_ms: u64) -> QueryResult {
    let columns: Vec<ResultColumn> = raw
        .columns
        .iter()
        .map(|c| ResultColumn::new(c.name.clone(), type_name(c.type_oid)))
        .collect();

    let rows = raw
        .rows
        .into_iter()
        .map(|values| {
            columns
                .iter()
                .map(|c| c.name.clone())
                .zip(values)
                .collect::<Row>()
        })
        .collect();

    QueryResult::success(
        sql.to_string(),
        columns,
        rows,
        raw.rows_affected,
        duration_ms,
    )
}

impl QueryOrchestrator {
    pub fn new(provider: Arc<dyn ConnectionProvider>, history: Arc<QueryHistory>) -> Self {
        let (status, _) = watch::channel(QueryStatus::Idle);
        Self {
            provider,
            history,
            slot: Mutex::new(Slot::Idle),
            status,
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn history(&self) -> &Arc<QueryHistory> {
        &self.history
    }

    pub fn status(&self) -> watch::Receiver<QueryStatus> {
        self.status.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.status.borrow().is_active()
    }

    /// Runs `sql` verbatim on a dedicated session of `connection`.
    ///
    /// A cancelled execution returns `Ok` with a result whose error is the
    /// cancellation message and is not recorded in history. Failures are
    /// recorded in history before being returned.
    pub async fn execute(
        &self,
        sql: &str,
        connection: &ConnectionId,
        cancel: Option<CancellationToken>,
    ) -> Result<QueryResult, ExecuteError> {
        {
            let mut slot = self.lock_slot();
            if !matches!(*slot, Slot::Idle) {
                return Err(ExecuteError::Busy);
            }
            *slot = Slot::Acquiring { cancelled: false };
        }
        let _guard = SlotGuard { orchestrator: self };
        self.status.send_replace(QueryStatus::Acquiring);

        let started = Instant::now();
        debug!(connection = %connection, "acquiring session");

        let acquire_failed = |source: DbError| {
            warn!(connection = %connection, error = %source, "session acquire failed");
            ExecuteError::Acquire {
                connection: self.provider.describe(connection),
                source,
            }
        };
        // Declared after the guard so the session is released first
        let mut session = self
            .provider
            .acquire(connection)
            .await
            .map_err(acquire_failed)?;
        let backend_pid = session.backend_pid().await.map_err(acquire_failed)?;

        {
            let mut slot = self.lock_slot();
            let cancelled_early = matches!(*slot, Slot::Acquiring { cancelled: true })
                || cancel.as_ref().is_some_and(CancellationToken::is_cancelled);
            if cancelled_early {
                drop(slot);
                info!(connection = %connection, "query cancelled before start");
                return Ok(QueryResult::cancelled(sql.to_string(), elapsed_ms(started)));
            }
            *slot = Slot::Running(ActiveQuery {
                connection: connection.clone(),
                backend_pid,
                cancelled: false,
            });
        }
        self.status.send_replace(QueryStatus::Running);
        info!(connection = %connection, backend_pid, "query started");

        let outcome = {
            let mut query = session.query(sql);
            match cancel {
                Some(token) => {
                    tokio::select! {
                        res = &mut query => res,
                        () = token.cancelled() => {
                            self.cancel_active().await;
                            // The server interrupts the statement; wait for the driver to report it
                            query.await
                        }
                    }
                }
                None => query.await,
            }
        };
        let duration_ms = elapsed_ms(started);

        match outcome {
            Ok(raw) => {
                let result = build_result(sql, raw, duration_ms);
                self.history.record(QueryHistoryItem::new(
                    sql,
                    connection.clone(),
                    duration_ms,
                    result.row_count,
                    None,
                ));
                info!(
                    connection = %connection,
                    rows = result.row_count,
                    duration_ms,
                    "query completed"
                );
                Ok(result)
            }
            Err(e) if e.is_cancellation() => {
                info!(connection = %connection, duration_ms, "query cancelled");
                Ok(QueryResult::cancelled(sql.to_string(), duration_ms))
            }
            Err(e) => {
                let message = e.to_string();
                self.history.record(QueryHistoryItem::new(
                    sql,
                    connection.clone(),
                    duration_ms,
                    0,
                    Some(message.clone()),
                ));
                warn!(connection = %connection, error = %message, "query failed");
                Err(ExecuteError::Failed {
                    connection: self.provider.describe(connection),
                    result: Box::new(QueryResult::error(
                        sql.to_string(),
                        message.clone(),
                        duration_ms,
                    )),
                    message,
                })
            }
        }
    }

    /// Requests cancellation of the active query.
    ///
    /// Returns false when nothing is running or cancellation was already
    /// requested. A failed cancel request is logged and otherwise ignored.
    pub async fn cancel_active(&self) -> bool {
        let (connection, backend_pid) = {
            let mut slot = self.lock_slot();
            match &mut *slot {
                Slot::Idle => return false,
                Slot::Acquiring { cancelled } => {
                    if *cancelled {
                        return false;
                    }
                    *cancelled = true;
                    return true;
                }
                Slot::Running(active) => {
                    if active.cancelled {
                        return false;
                    }
                    active.cancelled = true;
                    (active.connection.clone(), active.backend_pid)
                }
            }
        };

        match self.provider.cancel_backend(&connection, backend_pid).await {
            Ok(sent) => info!(connection = %connection, backend_pid, sent, "cancel requested"),
            Err(e) => warn!(
                connection = %connection,
                backend_pid,
                error = %e,
                "cancel request failed"
            ),
        }
        true
    }
}

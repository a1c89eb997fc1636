//! In-memory stand-ins for the database ports.
//!
//! `FakeDatabase` scripts query and execute outcomes, records every statement
//! a session receives, and counts sessions handed out and released. A query
//! scripted with [`FakeDatabase::push_blocking_query`] does not return until
//! a cancel request reaches its backend pid, and after
//! [`FakeDatabase::hold_next_acquire`] the next acquire waits to be released.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::domain::connection::ConnectionId;
use crate::ports::{ConnectionProvider, DbError, DbSession, RawColumn, RawResultSet};

const SERVER_CANCEL_MESSAGE: &str = "canceling statement due to user request";

#[derive(Debug)]
enum ScriptedQuery {
    Respond(Result<RawResultSet, DbError>),
    BlockUntilCancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Default)]
struct FakeState {
    connections: HashSet<ConnectionId>,
    queries: VecDeque<ScriptedQuery>,
    executes: VecDeque<Result<u64, DbError>>,
    query_log: Vec<String>,
    executed: Vec<ExecutedStatement>,
    acquired: usize,
    released: usize,
    cancel_requests: Vec<i32>,
    fail_cancel: bool,
    next_pid: i32,
    acquire_gate: Option<Arc<Notify>>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeDatabase {
    state: Arc<Mutex<FakeState>>,
    cancel_signal: Arc<Notify>,
}

impl FakeDatabase {
    /// A database that knows `connection`; other ids fail to acquire.
    pub fn with_connection(connection: &ConnectionId) -> Self {
        let db = Self::default();
        db.lock().connections.insert(connection.clone());
        db
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_query(&self, outcome: Result<RawResultSet, DbError>) {
        self.lock()
            .queries
            .push_back(ScriptedQuery::Respond(outcome));
    }

    /// Scripts a result set with the given columns (name, type oid) and rows.
    pub fn push_rows(&self, columns: &[(&str, u32)], rows: Vec<Vec<Value>>) {
        self.push_query(Ok(RawResultSet {
            columns: columns
                .iter()
                .map(|(name, oid)| RawColumn::new(*name, *oid))
                .collect(),
            rows,
            rows_affected: None,
        }));
    }

    pub fn push_blocking_query(&self) {
        self.lock()
            .queries
            .push_back(ScriptedQuery::BlockUntilCancelled);
    }

    /// Scripts the next `execute` outcome. Unscripted executes affect one row.
    pub fn push_execute(&self, outcome: Result<u64, DbError>) {
        self.lock().executes.push_back(outcome);
    }

    /// Makes the next `acquire` wait until the returned handle is notified.
    pub fn hold_next_acquire(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().acquire_gate = Some(Arc::clone(&gate));
        gate
    }

    pub fn fail_cancel_requests(&self) {
        self.lock().fail_cancel = true;
    }

    pub fn query_log(&self) -> Vec<String> {
        self.lock().query_log.clone()
    }

    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.lock().executed.clone()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.lock().executed.iter().map(|e| e.sql.clone()).collect()
    }

    pub fn cancel_requests(&self) -> Vec<i32> {
        self.lock().cancel_requests.clone()
    }

    pub fn sessions_acquired(&self) -> usize {
        self.lock().acquired
    }

    /// Sessions handed out and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        let state = self.lock();
        state.acquired - state.released
    }
}

#[async_trait]
impl ConnectionProvider for FakeDatabase {
    async fn acquire(&self, connection: &ConnectionId) -> Result<Box<dyn DbSession>, DbError> {
        let gate = self.lock().acquire_gate.take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut state = self.lock();
        if !state.connections.contains(connection) {
            return Err(DbError::UnknownConnection(connection.clone()));
        }
        state.acquired += 1;
        state.next_pid += 1;
        let backend_pid = 4000 + state.next_pid;
        drop(state);

        Ok(Box::new(FakeSession {
            db: self.clone(),
            backend_pid,
        }))
    }

    async fn cancel_backend(
        &self,
        _connection: &ConnectionId,
        backend_pid: i32,
    ) -> Result<bool, DbError> {
        let mut state = self.lock();
        state.cancel_requests.push(backend_pid);
        if state.fail_cancel {
            return Err(DbError::Connection("cancel connection refused".to_string()));
        }
        drop(state);
        self.cancel_signal.notify_one();
        Ok(true)
    }

    fn describe(&self, connection: &ConnectionId) -> String {
        format!("fake ({connection})")
    }
}

#[derive(Debug)]
pub struct FakeSession {
    db: FakeDatabase,
    backend_pid: i32,
}

#[async_trait]
impl DbSession for FakeSession {
    async fn backend_pid(&mut self) -> Result<i32, DbError> {
        Ok(self.backend_pid)
    }

    async fn query(&mut self, sql: &str) -> Result<RawResultSet, DbError> {
        let scripted = {
            let mut state = self.db.lock();
            state.query_log.push(sql.to_string());
            state.queries.pop_front()
        };

        match scripted {
            Some(ScriptedQuery::Respond(outcome)) => outcome,
            Some(ScriptedQuery::BlockUntilCancelled) => {
                self.db.cancel_signal.notified().await;
                Err(DbError::Query(SERVER_CANCEL_MESSAGE.to_string()))
            }
            None => Ok(RawResultSet::default()),
        }
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        let mut state = self.db.lock();
        state.executed.push(ExecutedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        state.executes.pop_front().unwrap_or(Ok(1))
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.db.lock().released += 1;
    }
}

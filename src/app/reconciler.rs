//! Writes a batch of client-side row edits back to the server.
//!
//! Order of execution is fixed: deletes by descending row index, then
//! updates by ascending row index, then inserts in the order supplied. Each
//! change runs as its own statement; one failure does not stop the rest.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::domain::connection::ConnectionId;
use crate::domain::{
    ColumnMeta, ModificationResult, QueryHistoryItem, RowChange, RowChangeKind, TableName,
};
use crate::ports::ConnectionProvider;
use crate::query_history::QueryHistory;
use crate::write_statement::{WriteStatement, build_delete, build_insert, build_update};

pub const NO_PRIMARY_KEY_MESSAGE: &str = "Cannot modify data without primary key columns defined";
pub const NO_CONNECTION_MESSAGE: &str = "No active database connection";

pub struct RowChangeReconciler {
    provider: Arc<dyn ConnectionProvider>,
    history: Arc<QueryHistory>,
}

/// Changes paired with their position in the caller's list, in execution order.
fn execution_order(changes: &[RowChange]) -> Vec<(usize, &RowChange)> {
    let of_kind = |kind: RowChangeKind| {
        changes
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.kind() == kind)
            .collect::<Vec<_>>()
    };

    let mut deletes = of_kind(RowChangeKind::Delete);
    deletes.sort_by_key(|(_, c)| Reverse(c.row_index()));
    let mut updates = of_kind(RowChangeKind::Update);
    updates.sort_by_key(|(_, c)| c.row_index());
    let inserts = of_kind(RowChangeKind::Insert);

    deletes.into_iter().chain(updates).chain(inserts).collect()
}

fn build_statement(
    change: &RowChange,
    table: &TableName,
    columns: &[ColumnMeta],
    primary_key: &[String],
) -> Result<Option<WriteStatement>, String> {
    match change {
        RowChange::Update {
            original,
            updated,
            modified_columns,
            ..
        } => build_update(
            table,
            columns,
            primary_key,
            original,
            updated,
            modified_columns,
        ),
        RowChange::Insert { values } => Ok(Some(build_insert(table, columns, values))),
        RowChange::Delete { original, .. } => build_delete(table, primary_key, original).map(Some),
    }
}

fn describe_failure(position: usize, change: &RowChange, message: &str) -> String {
    match change.row_index() {
        Some(row) => format!(
            "{} (change #{}, row {row}): {message}",
            change.kind(),
            position + 1
        ),
        None => format!("{} (change #{}): {message}", change.kind(), position + 1),
    }
}

impl RowChangeReconciler {
    pub fn new(provider: Arc<dyn ConnectionProvider>, history: Arc<QueryHistory>) -> Self {
        Self { provider, history }
    }

    /// Applies `changes` to `table` and reports what happened. Never fails:
    /// precondition violations and per-change errors land in the result.
    pub async fn reconcile(
        &self,
        changes: &[RowChange],
        columns: &[ColumnMeta],
        table: &TableName,
        primary_key: &[String],
        connection: Option<&ConnectionId>,
    ) -> ModificationResult {
        if primary_key.is_empty() {
            warn!(table = %table, "row changes rejected: no primary key");
            return ModificationResult::rejected(NO_PRIMARY_KEY_MESSAGE);
        }
        let Some(connection) = connection else {
            warn!(table = %table, "row changes rejected: no connection");
            return ModificationResult::rejected(NO_CONNECTION_MESSAGE);
        };
        if changes.is_empty() {
            return ModificationResult {
                success: true,
                ..ModificationResult::default()
            };
        }

        let mut session = match self.provider.acquire(connection).await {
            Ok(session) => session,
            Err(e) => {
                warn!(connection = %connection, error = %e, "session acquire failed");
                return ModificationResult::rejected(format!(
                    "{NO_CONNECTION_MESSAGE}: {} ({e})",
                    self.provider.describe(connection)
                ));
            }
        };

        let mut result = ModificationResult::default();
        for (position, change) in execution_order(changes) {
            let statement = match build_statement(change, table, columns, primary_key) {
                Ok(Some(statement)) => statement,
                Ok(None) => {
                    debug!(position, "update without modified columns skipped");
                    continue;
                }
                Err(message) => {
                    warn!(position, error = %message, "row change not executed");
                    result
                        .errors
                        .push(describe_failure(position, change, &message));
                    continue;
                }
            };

            let shown = statement.display_sql();
            debug!(sql = %shown, "executing row change");
            let started = Instant::now();
            let outcome = session.execute(&statement.sql, &statement.params).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(affected) => {
                    result.affected_row_count += affected;
                    self.history.record(QueryHistoryItem::new(
                        shown.clone(),
                        connection.clone(),
                        duration_ms,
                        affected,
                        None,
                    ));
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(position, sql = %shown, error = %message, "row change failed");
                    self.history.record(QueryHistoryItem::new(
                        shown.clone(),
                        connection.clone(),
                        duration_ms,
                        0,
                        Some(message.clone()),
                    ));
                    result
                        .errors
                        .push(describe_failure(position, change, &message));
                }
            }
            result.executed_sql.push(shown);
        }

        result.success = result.errors.is_empty();
        info!(
            table = %table,
            statements = result.executed_sql.len(),
            affected = result.affected_row_count,
            errors = result.errors.len(),
            "row changes applied"
        );
        result
    }
}

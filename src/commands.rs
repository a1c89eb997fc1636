//! Bodies of the `pgscribe` subcommands, kept apart from argument parsing so
//! they can run against the in-memory database fakes.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::app::execution_plan::{RunTarget, plan_execution};
use crate::app::ports::{DbError, MetadataProvider};
use crate::app::primary_key::resolve_primary_key;
use crate::app::query_classifier::{
    StatementKind, classify, has_row_limit, leading_keyword, mutating_keyword,
};
use crate::app::statement::split;
use crate::app::{ExecuteError, QueryOrchestrator, RowChangeReconciler};
use crate::domain::connection::{
    ConnectionId, ConnectionName, ConnectionNameError, ConnectionProfile, SslMode,
};
use crate::domain::{ColumnMeta, ModificationResult, QueryResult, RowChange, TableName};
use crate::infra::config::{Config, ConfigError};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Nothing to run")]
    NothingToRun,
    #[error("{keyword} statement not run; pass --yes to confirm it")]
    ConfirmationRequired { keyword: String },
    #[error("No primary key declared on {table}; pass --yes to use the guessed key {columns:?}")]
    KeyNeedsConfirmation { table: String, columns: Vec<String> },
    #[error(transparent)]
    Execute(#[from] ExecuteError),
    #[error(transparent)]
    Metadata(#[from] DbError),
    #[error("No connection named {0}")]
    UnknownConnection(String),
    #[error(transparent)]
    InvalidName(#[from] ConnectionNameError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementReport {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub kind: &'static str,
    pub leading_keyword: Option<String>,
    pub mutating_keyword: Option<&'static str>,
    pub has_row_limit: bool,
}

impl StatementReport {
    fn new(text: &str, start: usize, end: usize) -> Self {
        Self {
            text: text.to_string(),
            start,
            end,
            kind: match classify(text) {
                StatementKind::Read => "read",
                StatementKind::Write => "write",
            },
            leading_keyword: leading_keyword(text),
            mutating_keyword: mutating_keyword(text),
            has_row_limit: has_row_limit(text),
        }
    }
}

pub fn split_report(buffer: &str) -> Vec<StatementReport> {
    split(buffer)
        .iter()
        .map(|s| StatementReport::new(&s.text, s.start, s.end))
        .collect()
}

pub fn classify_report(statement: &str) -> StatementReport {
    StatementReport::new(statement, 0, statement.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub target: RunTarget,
    pub row_limit: Option<usize>,
    /// Writes only run when confirmed
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub row_limit_applied: bool,
    pub skipped_statements: usize,
    pub result: QueryResult,
}

/// Plans `buffer`, refuses unconfirmed writes and executes the chosen
/// statement. Cancelling `cancel` interrupts the statement on the server.
pub async fn run(
    orchestrator: &QueryOrchestrator,
    connection: &ConnectionId,
    buffer: &str,
    options: RunOptions,
    cancel: CancellationToken,
) -> Result<RunReport, CommandError> {
    let plan = plan_execution(buffer, options.target, options.row_limit)
        .ok_or(CommandError::NothingToRun)?;

    if plan.needs_confirmation() && !options.confirmed {
        return Err(CommandError::ConfirmationRequired {
            keyword: plan.mutating_keyword.unwrap_or("Write").to_string(),
        });
    }

    let result = orchestrator
        .execute(&plan.sql, connection, Some(cancel))
        .await?;
    Ok(RunReport {
        row_limit_applied: plan.row_limit_applied,
        skipped_statements: plan.skipped_statements,
        result,
    })
}

/// A batch of edits against one table, as read from JSON. Columns and key
/// are looked up when omitted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeSet {
    pub table: String,
    #[serde(default)]
    pub columns: Option<Vec<ColumnMeta>>,
    #[serde(default)]
    pub primary_key: Option<Vec<String>>,
    pub changes: Vec<RowChange>,
}

pub async fn save(
    reconciler: &RowChangeReconciler,
    metadata: &dyn MetadataProvider,
    connection: &ConnectionId,
    change_set: ChangeSet,
    confirmed: bool,
) -> Result<ModificationResult, CommandError> {
    let table = TableName::parse(&change_set.table);
    let columns = match change_set.columns {
        Some(columns) => columns,
        None => metadata.table_columns(connection, &table).await?,
    };

    let primary_key = match change_set.primary_key {
        Some(primary_key) => primary_key,
        None => {
            let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
            match resolve_primary_key(metadata, connection, &table, &names).await? {
                Some(key) if key.needs_confirmation() && !confirmed => {
                    return Err(CommandError::KeyNeedsConfirmation {
                        table: table.to_string(),
                        columns: key.columns,
                    });
                }
                Some(key) => key.columns,
                // The reconciler reports the missing key
                None => Vec::new(),
            }
        }
    };

    info!(table = %table, changes = change_set.changes.len(), "saving row changes");
    Ok(reconciler
        .reconcile(
            &change_set.changes,
            &columns,
            &table,
            &primary_key,
            Some(connection),
        )
        .await)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub id: String,
    pub name: String,
    pub dsn: String,
}

impl From<&ConnectionProfile> for ConnectionSummary {
    fn from(profile: &ConnectionProfile) -> Self {
        Self {
            id: profile.id.to_string(),
            name: profile.name.to_string(),
            dsn: profile.to_masked_dsn(),
        }
    }
}

/// Profiles with passwords masked.
pub fn connection_summaries(profiles: &[ConnectionProfile]) -> Vec<ConnectionSummary> {
    profiles.iter().map(ConnectionSummary::from).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConnection {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub ssl_mode: SslMode,
}

/// Adds a profile under a fresh id. Names stay unique case-insensitively.
pub fn add_connection(
    config: &mut Config,
    new: NewConnection,
) -> Result<ConnectionSummary, CommandError> {
    let profile = ConnectionProfile::new(
        ConnectionName::new(new.name)?,
        new.host,
        new.port,
        new.database,
        new.username,
        new.password,
        new.ssl_mode,
    );
    let summary = ConnectionSummary::from(&profile);
    config.upsert_connection(profile)?;
    info!(name = %summary.name, "connection added");
    Ok(summary)
}

/// Removes the profile matching `key` by id or name.
pub fn remove_connection(
    config: &mut Config,
    key: &str,
) -> Result<ConnectionSummary, CommandError> {
    let profile = config
        .find_connection(key)
        .cloned()
        .ok_or_else(|| CommandError::UnknownConnection(key.to_string()))?;
    config.remove_connection(&profile.id);
    info!(name = %profile.name, "connection removed");
    Ok(ConnectionSummary::from(&profile))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::app::QueryHistory;
    use crate::app::test_support::FakeDatabase;
    use crate::domain::pg_type;
    use async_trait::async_trait;
    use serde_json::json;

    fn conn() -> ConnectionId {
        ConnectionId::from_string("local")
    }

    fn orchestrator(db: &FakeDatabase) -> QueryOrchestrator {
        QueryOrchestrator::new(Arc::new(db.clone()), Arc::new(QueryHistory::default()))
    }

    fn options(confirmed: bool) -> RunOptions {
        RunOptions {
            target: RunTarget::Whole,
            row_limit: Some(100),
            confirmed,
        }
    }

    struct StaticMetadata {
        primary_key: Vec<String>,
        columns: Vec<ColumnMeta>,
    }

    #[async_trait]
    impl MetadataProvider for StaticMetadata {
        async fn primary_key_columns(
            &self,
            _connection: &ConnectionId,
            _table: &TableName,
        ) -> Result<Vec<String>, DbError> {
            Ok(self.primary_key.clone())
        }

        async fn table_columns(
            &self,
            _connection: &ConnectionId,
            _table: &TableName,
        ) -> Result<Vec<ColumnMeta>, DbError> {
            Ok(self.columns.clone())
        }
    }

    mod reports {
        use super::*;

        #[test]
        fn split_reports_each_statement() {
            let reports = split_report("SELECT 1; -- note\nUPDATE t SET a = 1;");

            assert_eq!(reports.len(), 2);
            assert_eq!(reports[0].text, "SELECT 1");
            assert_eq!(reports[0].kind, "read");
            assert_eq!(reports[1].kind, "write");
            assert_eq!(reports[1].mutating_keyword, Some("UPDATE"));
            assert_eq!(reports[1].leading_keyword.as_deref(), Some("UPDATE"));
        }

        #[test]
        fn classify_reports_existing_limit() {
            let report = classify_report("select * from t limit 5");

            assert_eq!(report.kind, "read");
            assert!(report.has_row_limit);
            assert_eq!(report.end, 23);
        }

        #[test]
        fn connection_summaries_hide_passwords() {
            let profile = ConnectionProfile::new(
                ConnectionName::new("Local").unwrap(),
                "localhost",
                5432,
                "app",
                "me",
                "hunter2",
                SslMode::Disable,
            );

            let summaries = connection_summaries(&[profile]);

            assert_eq!(summaries[0].name, "Local");
            assert!(!summaries[0].dsn.contains("hunter2"));
        }
    }

    mod connections {
        use super::*;

        fn new_connection(name: &str) -> NewConnection {
            NewConnection {
                name: name.to_string(),
                host: "localhost".to_string(),
                port: 5432,
                database: "app".to_string(),
                username: "me".to_string(),
                password: "hunter2".to_string(),
                ssl_mode: SslMode::Disable,
            }
        }

        #[test]
        fn add_then_remove_by_name() {
            let mut config = Config::default();

            let added = add_connection(&mut config, new_connection("Local")).unwrap();
            assert_eq!(added.name, "Local");
            assert!(!added.dsn.contains("hunter2"));
            assert_eq!(config.connections.len(), 1);
            assert_eq!(config.connections[0].password, "hunter2");

            let removed = remove_connection(&mut config, "local").unwrap();
            assert_eq!(removed.id, added.id);
            assert!(config.connections.is_empty());
        }

        #[test]
        fn add_refuses_a_taken_name() {
            let mut config = Config::default();
            add_connection(&mut config, new_connection("Local")).unwrap();

            let err = add_connection(&mut config, new_connection("LOCAL")).unwrap_err();

            assert!(matches!(err, CommandError::Config(ConfigError::DuplicateName(_))));
            assert_eq!(config.connections.len(), 1);
        }

        #[test]
        fn add_refuses_a_blank_name() {
            let err = add_connection(&mut Config::default(), new_connection("  ")).unwrap_err();

            assert!(matches!(err, CommandError::InvalidName(ConnectionNameError::Empty)));
        }

        #[test]
        fn remove_unknown_connection_fails() {
            let err = remove_connection(&mut Config::default(), "nope").unwrap_err();

            assert!(matches!(err, CommandError::UnknownConnection(ref key) if key == "nope"));
        }
    }

    mod run {
        use super::*;

        #[tokio::test]
        async fn read_gets_row_limit() {
            let db = FakeDatabase::with_connection(&conn());
            db.push_rows(&[("n", pg_type::INT4)], vec![vec![json!(1)]]);

            let report = run(
                &orchestrator(&db),
                &conn(),
                "SELECT n FROM t; SELECT 2",
                options(false),
                CancellationToken::new(),
            )
            .await
            .unwrap();

            assert!(report.row_limit_applied);
            assert_eq!(report.skipped_statements, 1);
            assert_eq!(report.result.row_count, 1);
            assert_eq!(db.query_log(), vec!["SELECT n FROM t LIMIT 100"]);
        }

        #[tokio::test]
        async fn unconfirmed_write_is_not_sent() {
            let db = FakeDatabase::with_connection(&conn());

            let err = run(
                &orchestrator(&db),
                &conn(),
                "DELETE FROM t",
                options(false),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

            assert!(
                matches!(err, CommandError::ConfirmationRequired { ref keyword } if keyword == "DELETE")
            );
            assert_eq!(db.sessions_acquired(), 0);
        }

        #[tokio::test]
        async fn confirmed_write_runs() {
            let db = FakeDatabase::with_connection(&conn());

            run(
                &orchestrator(&db),
                &conn(),
                "DELETE FROM t",
                options(true),
                CancellationToken::new(),
            )
            .await
            .unwrap();

            assert_eq!(db.query_log(), vec!["DELETE FROM t"]);
        }

        #[tokio::test]
        async fn empty_buffer_has_nothing_to_run() {
            let db = FakeDatabase::with_connection(&conn());

            let err = run(
                &orchestrator(&db),
                &conn(),
                "-- just a comment",
                options(true),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

            assert!(matches!(err, CommandError::NothingToRun));
        }
    }

    mod save {
        use super::*;

        fn change_set(primary_key: Option<Vec<String>>) -> ChangeSet {
            ChangeSet {
                table: "public.users".to_string(),
                columns: None,
                primary_key,
                changes: vec![RowChange::Delete {
                    row_index: 0,
                    original: json!({"id": 7, "name": "x"})
                        .as_object()
                        .cloned()
                        .unwrap(),
                }],
            }
        }

        fn metadata(primary_key: &[&str]) -> StaticMetadata {
            StaticMetadata {
                primary_key: primary_key.iter().map(|c| (*c).to_string()).collect(),
                columns: vec![
                    ColumnMeta::new("id", "integer"),
                    ColumnMeta::new("name", "text"),
                ],
            }
        }

        fn reconciler(db: &FakeDatabase) -> RowChangeReconciler {
            RowChangeReconciler::new(Arc::new(db.clone()), Arc::new(QueryHistory::default()))
        }

        #[tokio::test]
        async fn declared_key_is_used() {
            let db = FakeDatabase::with_connection(&conn());

            let result = save(
                &reconciler(&db),
                &metadata(&["id"]),
                &conn(),
                change_set(None),
                false,
            )
            .await
            .unwrap();

            assert!(result.success);
            assert_eq!(
                db.executed_sql(),
                vec![r#"DELETE FROM "public"."users" WHERE "id" = $1"#]
            );
        }

        #[tokio::test]
        async fn guessed_key_needs_confirmation() {
            let db = FakeDatabase::with_connection(&conn());

            let err = save(
                &reconciler(&db),
                &metadata(&[]),
                &conn(),
                change_set(None),
                false,
            )
            .await
            .unwrap_err();

            assert!(
                matches!(err, CommandError::KeyNeedsConfirmation { ref columns, .. } if columns == &["id"])
            );
            assert!(db.executed_sql().is_empty());
        }

        #[tokio::test]
        async fn explicit_key_skips_lookup() {
            let db = FakeDatabase::with_connection(&conn());

            let result = save(
                &reconciler(&db),
                &metadata(&[]),
                &conn(),
                change_set(Some(vec!["name".to_string()])),
                false,
            )
            .await
            .unwrap();

            assert_eq!(
                result.executed_sql,
                vec![r#"DELETE FROM "public"."users" WHERE "name" = 'x'"#]
            );
        }
    }
}

use std::fs;
use std::io::{Read, Write, stdin, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use pgscribe::app::execution_plan::RunTarget;
use pgscribe::app::{QueryHistory, QueryOrchestrator, RowChangeReconciler};
use pgscribe::commands::{self, ChangeSet, NewConnection, RunOptions};
use pgscribe::domain::connection::{ConnectionProfile, SslMode};
use pgscribe::error;
use pgscribe::infra::config::{Config, TomlConfigStore};
use pgscribe::infra::postgres::PgConnectionProvider;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file; defaults to <config dir>/pgscribe/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one statement from inline SQL, a file or stdin
    Run {
        /// Connection id or name
        #[arg(short, long)]
        connection: String,
        sql: Option<String>,
        #[arg(short, long, conflicts_with = "sql")]
        file: Option<PathBuf>,
        /// Run the statement under this byte offset
        #[arg(long)]
        cursor: Option<usize>,
        /// Row limit for reads without one; 0 disables it
        #[arg(long)]
        limit: Option<usize>,
        /// Confirm write statements
        #[arg(short, long)]
        yes: bool,
    },
    /// Split SQL into statements
    Split {
        sql: Option<String>,
        #[arg(short, long, conflicts_with = "sql")]
        file: Option<PathBuf>,
    },
    /// Classify one statement
    Classify { sql: String },
    /// Write a JSON change set back to its table
    Save {
        #[arg(short, long)]
        connection: String,
        /// Change set file; stdin when omitted
        file: Option<PathBuf>,
        /// Accept a guessed primary key
        #[arg(short, long)]
        yes: bool,
    },
    /// List, add or remove configured connections
    Connections {
        #[command(subcommand)]
        action: Option<ConnectionAction>,
    },
}

#[derive(Subcommand, Debug)]
enum ConnectionAction {
    /// List configured connections (the default)
    List,
    /// Add a connection profile
    Add {
        name: String,
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = 5432)]
        port: u16,
        #[arg(short, long)]
        database: String,
        #[arg(short, long)]
        username: String,
        #[arg(long, default_value_t)]
        password: String,
        /// libpq sslmode; modes that require TLS are refused at connect time
        #[arg(long, default_value_t = SslMode::Prefer)]
        ssl_mode: SslMode,
    },
    /// Remove a connection by id or name
    Remove { connection: String },
}

fn read_input(sql: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(sql) = sql {
        return Ok(sql);
    }
    if let Some(path) = file {
        return fs::read_to_string(&path).wrap_err_with(|| format!("reading {}", path.display()));
    }
    let mut buffer = String::new();
    stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let mut out = stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn connection_profile(
    config: &Config,
    key: &str,
    store: &TomlConfigStore,
) -> Result<ConnectionProfile> {
    config
        .find_connection(key)
        .cloned()
        .ok_or_else(|| eyre!("no connection named {key} in {}", store.path().display()))
}

fn provider(config: &Config) -> Arc<PgConnectionProvider> {
    let timeout = config.settings.query_timeout_secs.map(Duration::from_secs);
    Arc::new(PgConnectionProvider::new(config.connections.clone()).with_statement_timeout(timeout))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    error::install_hooks()?;
    error::init_tracing();

    let cli = Cli::parse();
    let store = match cli.config {
        Some(path) => TomlConfigStore::with_path(path),
        None => TomlConfigStore::new()?,
    };
    debug!(path = %store.path().display(), "config store");

    match cli.command {
        Command::Run {
            connection,
            sql,
            file,
            cursor,
            limit,
            yes,
        } => {
            let config = store.load()?;
            let profile = connection_profile(&config, &connection, &store)?;
            let orchestrator = QueryOrchestrator::new(
                provider(&config),
                Arc::new(QueryHistory::new(config.settings.history_capacity)),
            );
            let buffer = read_input(sql, file)?;
            let options = RunOptions {
                target: cursor.map_or(RunTarget::Whole, RunTarget::AtCursor),
                row_limit: match limit {
                    Some(0) => None,
                    Some(n) => Some(n),
                    None => Some(config.settings.default_row_limit),
                },
                confirmed: yes,
            };

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let report = commands::run(&orchestrator, &profile.id, &buffer, options, cancel).await?;
            print_json(&report)
        }
        Command::Split { sql, file } => {
            print_json(&commands::split_report(&read_input(sql, file)?))
        }
        Command::Classify { sql } => print_json(&commands::classify_report(&sql)),
        Command::Save {
            connection,
            file,
            yes,
        } => {
            let config = store.load()?;
            let profile = connection_profile(&config, &connection, &store)?;
            let change_set: ChangeSet = serde_json::from_str(&read_input(None, file)?)
                .wrap_err("invalid change set")?;

            let postgres = provider(&config);
            let reconciler = RowChangeReconciler::new(
                Arc::clone(&postgres) as _,
                Arc::new(QueryHistory::new(config.settings.history_capacity)),
            );
            let result =
                commands::save(&reconciler, postgres.as_ref(), &profile.id, change_set, yes).await?;
            print_json(&result)
        }
        Command::Connections { action } => {
            let mut config = store.load()?;
            match action.unwrap_or(ConnectionAction::List) {
                ConnectionAction::List => {
                    print_json(&commands::connection_summaries(&config.connections))
                }
                ConnectionAction::Add {
                    name,
                    host,
                    port,
                    database,
                    username,
                    password,
                    ssl_mode,
                } => {
                    let new = NewConnection {
                        name,
                        host,
                        port,
                        database,
                        username,
                        password,
                        ssl_mode,
                    };
                    let added = commands::add_connection(&mut config, new)?;
                    store.save(&config)?;
                    print_json(&added)
                }
                ConnectionAction::Remove { connection } => {
                    let removed = commands::remove_connection(&mut config, &connection)?;
                    store.save(&config)?;
                    print_json(&removed)
                }
            }
        }
    }
}

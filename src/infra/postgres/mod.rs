//! PostgreSQL sessions over `tokio-postgres`.
//!
//! Each acquired session owns one client; finished sessions go back to a
//! small per-connection idle pool. Cancellation is sent from a second
//! session with `pg_cancel_backend`.

mod decode;
mod metadata;
mod params;
mod session;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_postgres::config::SslMode as PgSslMode;
use tokio_postgres::{Client, Config, NoTls};
use tracing::{debug, info};

use crate::app::ports::{ConnectionProvider, DbError, DbSession};
use crate::domain::connection::{ConnectionId, ConnectionProfile, SslMode};

pub use decode::{collect_result_set, decode_text, map_error};
pub use params::TextParam;
pub use session::PgSession;

use session::{IdlePool, lock_pool};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const APPLICATION_NAME: &str = "pgscribe";

/// Only plaintext sessions are available; profiles whose mode insists on
/// TLS are refused before connecting.
fn ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Allow | SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => PgSslMode::Require,
    }
}

/// Driver configuration for `profile`. A statement timeout is applied as a
/// session default through the startup options.
pub fn pg_config(profile: &ConnectionProfile, statement_timeout: Option<Duration>) -> Config {
    let mut config = Config::new();
    config
        .host(&profile.host)
        .port(profile.port)
        .user(&profile.username)
        .dbname(&profile.database)
        .ssl_mode(ssl_mode(profile.ssl_mode))
        .application_name(APPLICATION_NAME)
        .connect_timeout(CONNECT_TIMEOUT);
    if !profile.password.is_empty() {
        config.password(&profile.password);
    }
    if let Some(timeout) = statement_timeout {
        config.options(&format!("-c statement_timeout={}", timeout.as_millis()));
    }
    config
}

pub struct PgConnectionProvider {
    profiles: HashMap<ConnectionId, ConnectionProfile>,
    statement_timeout: Option<Duration>,
    idle: IdlePool,
}

impl PgConnectionProvider {
    pub fn new(profiles: impl IntoIterator<Item = ConnectionProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|profile| (profile.id.clone(), profile))
                .collect(),
            statement_timeout: None,
            idle: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    fn profile(&self, connection: &ConnectionId) -> Result<&ConnectionProfile, DbError> {
        self.profiles
            .get(connection)
            .ok_or_else(|| DbError::UnknownConnection(connection.clone()))
    }

    fn take_idle(&self, connection: &ConnectionId) -> Option<Client> {
        let mut idle = lock_pool(&self.idle);
        let clients = idle.get_mut(connection)?;
        while let Some(client) = clients.pop() {
            if !client.is_closed() {
                return Some(client);
            }
        }
        None
    }

    async fn connect(&self, profile: &ConnectionProfile) -> Result<Client, DbError> {
        if profile.ssl_mode.requires_tls() {
            return Err(DbError::Connection(format!(
                "sslmode={} needs TLS, which is not supported",
                profile.ssl_mode
            )));
        }

        let config = pg_config(profile, self.statement_timeout);
        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let target = profile.to_masked_dsn();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!(target = %target, error = %e, "connection closed with error");
            }
        });

        info!(target = %profile.to_masked_dsn(), "connected");
        Ok(client)
    }

    pub(crate) async fn checkout(&self, connection: &ConnectionId) -> Result<PgSession, DbError> {
        let profile = self.profile(connection)?;
        let client = match self.take_idle(connection) {
            Some(client) => client,
            None => self.connect(profile).await?,
        };
        Ok(PgSession::new(
            client,
            connection.clone(),
            Arc::clone(&self.idle),
        ))
    }
}

#[async_trait]
impl ConnectionProvider for PgConnectionProvider {
    async fn acquire(&self, connection: &ConnectionId) -> Result<Box<dyn DbSession>, DbError> {
        Ok(Box::new(self.checkout(connection).await?))
    }

    async fn cancel_backend(
        &self,
        connection: &ConnectionId,
        backend_pid: i32,
    ) -> Result<bool, DbError> {
        let session = self.checkout(connection).await?;
        let row = session
            .client()?
            .query_one("SELECT pg_cancel_backend($1)", &[&backend_pid])
            .await
            .map_err(map_error)?;
        let cancelled: bool = row.try_get(0).map_err(map_error)?;
        debug!(connection = %connection, backend_pid, cancelled, "cancel requested");
        Ok(cancelled)
    }

    fn describe(&self, connection: &ConnectionId) -> String {
        self.profiles
            .get(connection)
            .map_or_else(|| "unknown connection".to_string(), ConnectionProfile::display_name)
    }
}

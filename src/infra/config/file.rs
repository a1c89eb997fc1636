use serde::{Deserialize, Serialize};

use crate::app::HISTORY_CAPACITY;
use crate::app::query_classifier::DEFAULT_ROW_LIMIT;
use crate::domain::connection::{ConnectionId, ConnectionName, ConnectionProfile, SslMode};

pub const CURRENT_VERSION: u32 = 1;

fn default_row_limit() -> usize {
    DEFAULT_ROW_LIMIT
}

fn default_history_capacity() -> usize {
    HISTORY_CAPACITY
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_row_limit")]
    pub default_row_limit: usize,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Sent to the server as `statement_timeout`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_row_limit: DEFAULT_ROW_LIMIT,
            history_capacity: HISTORY_CAPACITY,
            query_timeout_secs: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: u32,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub id: String,
    pub name: ConnectionName,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub ssl_mode: SslMode,
}

impl ConnectionEntry {
    pub fn from_profile(profile: &ConnectionProfile) -> Self {
        Self {
            id: profile.id.as_str().to_string(),
            name: profile.name.clone(),
            host: profile.host.clone(),
            port: profile.port,
            database: profile.database.clone(),
            username: profile.username.clone(),
            password: profile.password.clone(),
            ssl_mode: profile.ssl_mode,
        }
    }

    pub fn into_profile(self) -> ConnectionProfile {
        ConnectionProfile {
            id: ConnectionId::from_string(self.id),
            name: self.name,
            host: self.host,
            port: self.port,
            database: self.database,
            username: self.username,
            password: self.password,
            ssl_mode: self.ssl_mode,
        }
    }
}

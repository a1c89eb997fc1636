use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::domain::connection::{ConnectionId, ConnectionProfile};

use super::file::{CURRENT_VERSION, ConfigFile, ConnectionEntry, Settings};

const APP_DIR_NAME: &str = "pgscribe";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Read error: {0}")]
    Read(String),
    #[error("Invalid config: {0}")]
    Parse(String),
    #[error("Config version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },
    #[error("Write error: {0}")]
    Write(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Connection name already exists: {0}")]
    DuplicateName(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub settings: Settings,
    pub connections: Vec<ConnectionProfile>,
}

impl Config {
    /// Looks a connection up by id, then by name (case-insensitive).
    pub fn find_connection(&self, key: &str) -> Option<&ConnectionProfile> {
        self.connections
            .iter()
            .find(|p| p.id.as_str() == key)
            .or_else(|| self.connections.iter().find(|p| p.name.matches(key)))
    }

    /// Adds `profile`, replacing any profile with the same id.
    pub fn upsert_connection(&mut self, profile: ConnectionProfile) -> Result<(), ConfigError> {
        if self
            .connections
            .iter()
            .any(|p| p.id != profile.id && p.name.matches(profile.name.as_str()))
        {
            return Err(ConfigError::DuplicateName(profile.name.to_string()));
        }
        match self.connections.iter_mut().find(|p| p.id == profile.id) {
            Some(existing) => *existing = profile,
            None => self.connections.push(profile),
        }
        Ok(())
    }

    pub fn remove_connection(&mut self, id: &ConnectionId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|p| &p.id != id);
        self.connections.len() != before
    }

    fn check_unique_names(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for profile in &self.connections {
            if !seen.insert(profile.name.normalized()) {
                return Err(ConfigError::DuplicateName(profile.name.to_string()));
            }
        }
        Ok(())
    }
}

pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    /// Store at `<config dir>/pgscribe/config.toml`.
    pub fn new() -> Result<Self, ConfigError> {
        let config_base = dirs::config_dir()
            .ok_or_else(|| ConfigError::Io("Could not find config directory".into()))?;
        Ok(Self::with_path(
            config_base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME),
        ))
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file loads as the default configuration.
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no config file; using defaults");
            return Ok(Config::default());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| ConfigError::Read(e.to_string()))?;
        let file: ConfigFile =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if file.version != CURRENT_VERSION {
            return Err(ConfigError::VersionMismatch {
                found: file.version,
                expected: CURRENT_VERSION,
            });
        }

        let config = Config {
            settings: file.settings,
            connections: file
                .connections
                .into_iter()
                .map(ConnectionEntry::into_profile)
                .collect(),
        };
        config.check_unique_names()?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        config.check_unique_names()?;

        if let Some(dir) = self.path.parent()
            && !dir.exists()
        {
            fs::create_dir_all(dir).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let file = ConfigFile {
            version: CURRENT_VERSION,
            settings: config.settings.clone(),
            connections: config
                .connections
                .iter()
                .map(ConnectionEntry::from_profile)
                .collect(),
        };
        let content =
            toml::to_string_pretty(&file).map_err(|e| ConfigError::Write(e.to_string()))?;
        let content_with_header = format!(
            "# pgscribe configuration\n# WARNING: Passwords are stored in plain text\n\n{content}"
        );

        fs::write(&self.path, content_with_header).map_err(|e| ConfigError::Write(e.to_string()))?;
        set_file_permissions(&self.path)?;

        debug!(path = %self.path.display(), connections = config.connections.len(), "config saved");
        Ok(())
    }
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(0o600);
    fs::set_permissions(path, perms).map_err(|e| ConfigError::Io(e.to_string()))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::connection::{ConnectionName, SslMode};
    use tempfile::TempDir;

    fn profile(name: &str) -> ConnectionProfile {
        ConnectionProfile::new(
            ConnectionName::new(name).unwrap(),
            "localhost",
            5432,
            "testdb",
            "testuser",
            "testpass",
            SslMode::Prefer,
        )
    }

    fn store_in(temp_dir: &TempDir) -> TomlConfigStore {
        TomlConfigStore::with_path(temp_dir.path().join(CONFIG_FILE_NAME))
    }

    mod load {
        use super::*;

        #[test]
        fn missing_file_gives_defaults() {
            let temp_dir = TempDir::new().unwrap();

            let config = store_in(&temp_dir).load().unwrap();

            assert_eq!(config.settings.default_row_limit, 100);
            assert_eq!(config.settings.history_capacity, 100);
            assert_eq!(config.settings.query_timeout_secs, None);
            assert!(config.connections.is_empty());
        }

        #[test]
        fn reads_settings_and_connections() {
            let temp_dir = TempDir::new().unwrap();
            let content = r#"
version = 1

[settings]
default_row_limit = 250
query_timeout_secs = 30

[[connections]]
id = "local-id"
name = "Local"
host = "localhost"
port = 5432
database = "app"
username = "app"
ssl_mode = "disable"
"#;
            fs::write(temp_dir.path().join(CONFIG_FILE_NAME), content).unwrap();

            let config = store_in(&temp_dir).load().unwrap();

            assert_eq!(config.settings.default_row_limit, 250);
            assert_eq!(config.settings.history_capacity, 100);
            assert_eq!(config.settings.query_timeout_secs, Some(30));
            let local = config.find_connection("local").unwrap();
            assert_eq!(local.id.as_str(), "local-id");
            assert_eq!(local.password, "");
            assert_eq!(local.ssl_mode, SslMode::Disable);
        }

        #[test]
        fn version_mismatch_is_rejected() {
            let temp_dir = TempDir::new().unwrap();
            fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "version = 0\n").unwrap();

            let result = store_in(&temp_dir).load();

            assert_eq!(
                result,
                Err(ConfigError::VersionMismatch {
                    found: 0,
                    expected: 1
                })
            );
        }

        #[test]
        fn invalid_toml_is_a_parse_error() {
            let temp_dir = TempDir::new().unwrap();
            fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "invalid toml {{{{").unwrap();

            let result = store_in(&temp_dir).load();

            assert!(matches!(result, Err(ConfigError::Parse(_))));
        }

        #[test]
        fn empty_connection_name_is_a_parse_error() {
            let temp_dir = TempDir::new().unwrap();
            let content = r#"
version = 1

[[connections]]
id = "x"
name = "  "
host = "h"
port = 1
database = "d"
username = "u"
"#;
            fs::write(temp_dir.path().join(CONFIG_FILE_NAME), content).unwrap();

            let result = store_in(&temp_dir).load();

            assert!(matches!(result, Err(ConfigError::Parse(msg)) if msg.contains("empty")));
        }
    }

    mod save {
        use super::*;

        #[test]
        fn creates_config_directory_if_missing() {
            let temp_dir = TempDir::new().unwrap();
            let path = temp_dir.path().join("nested").join(CONFIG_FILE_NAME);
            let store = TomlConfigStore::with_path(path.clone());

            store.save(&Config::default()).unwrap();

            assert!(path.exists());
        }

        #[cfg(unix)]
        #[test]
        fn sets_permissions_to_0600() {
            use std::os::unix::fs::PermissionsExt;

            let temp_dir = TempDir::new().unwrap();
            let store = store_in(&temp_dir);

            store.save(&Config::default()).unwrap();

            let mode = fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }

        #[test]
        fn save_and_load_preserves_data() {
            let temp_dir = TempDir::new().unwrap();
            let store = store_in(&temp_dir);
            let mut config = Config::default();
            config.settings.query_timeout_secs = Some(15);
            config.upsert_connection(profile("Local")).unwrap();
            config.upsert_connection(profile("Staging")).unwrap();

            store.save(&config).unwrap();
            let loaded = store.load().unwrap();

            assert_eq!(loaded, config);
            let content = fs::read_to_string(store.path()).unwrap();
            assert!(content.starts_with("# pgscribe configuration"));
        }

        #[test]
        fn duplicate_names_are_refused() {
            let temp_dir = TempDir::new().unwrap();
            let config = Config {
                settings: Settings::default(),
                connections: vec![profile("Local"), profile("local")],
            };

            let result = store_in(&temp_dir).save(&config);

            assert_eq!(result, Err(ConfigError::DuplicateName("local".to_string())));
        }
    }

    mod connections {
        use super::*;

        #[test]
        fn upsert_replaces_by_id_and_rejects_name_clash() {
            let mut config = Config::default();
            let mut local = profile("Local");
            config.upsert_connection(local.clone()).unwrap();

            local.port = 6543;
            config.upsert_connection(local.clone()).unwrap();
            assert_eq!(config.connections.len(), 1);
            assert_eq!(config.connections[0].port, 6543);

            let clash = config.upsert_connection(profile("LOCAL"));
            assert!(matches!(clash, Err(ConfigError::DuplicateName(_))));
        }

        #[test]
        fn find_by_id_or_name_and_remove() {
            let mut config = Config::default();
            let local = profile("Local");
            config.upsert_connection(local.clone()).unwrap();

            assert_eq!(config.find_connection(local.id.as_str()), Some(&local));
            assert_eq!(config.find_connection(" LOCAL "), Some(&local));
            assert!(config.find_connection("other").is_none());

            assert!(config.remove_connection(&local.id));
            assert!(!config.remove_connection(&local.id));
        }
    }
}

pub mod file;
pub mod store;

pub use file::{CURRENT_VERSION, Settings};
pub use store::{Config, ConfigError, TomlConfigStore};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAX_LENGTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionNameError {
    #[error("Connection name cannot be empty")]
    Empty,
    #[error("Connection name too long: {len} chars (max {max})")]
    TooLong { len: usize, max: usize },
}

/// Human-facing label of a connection, used in error messages and history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionName(String);

impl ConnectionName {
    pub fn new(name: impl Into<String>) -> Result<Self, ConnectionNameError> {
        let name = name.into();
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err(ConnectionNameError::Empty);
        }

        let len = trimmed.chars().count();
        if len > MAX_LENGTH {
            return Err(ConnectionNameError::TooLong {
                len,
                max: MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// For case-insensitive uniqueness comparison.
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn matches(&self, other: &str) -> bool {
        self.normalized() == other.trim().to_lowercase()
    }
}

impl fmt::Display for ConnectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ConnectionName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ConnectionName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Production", true)]
    #[case("  staging  ", true)]
    #[case("", false)]
    #[case("   ", false)]
    fn validation(#[case] input: &str, #[case] should_succeed: bool) {
        assert_eq!(ConnectionName::new(input).is_ok(), should_succeed);
    }

    #[test]
    fn over_limit_returns_too_long_error() {
        let result = ConnectionName::new("x".repeat(51));
        assert_eq!(
            result,
            Err(ConnectionNameError::TooLong { len: 51, max: 50 })
        );
    }

    #[test]
    fn matches_ignores_case_and_padding() {
        let name = ConnectionName::new("Local Dev").unwrap();
        assert!(name.matches("  local dev"));
        assert!(!name.matches("local"));
    }

    #[test]
    fn deserialize_empty_returns_error() {
        let result: Result<ConnectionName, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}

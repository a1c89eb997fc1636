use std::fmt;

use serde::{Deserialize, Serialize};

/// A possibly schema-qualified table name. `Display` renders it as quoted
/// identifiers ready to be spliced into generated SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Parses `schema.table` or `table` the way PostgreSQL reads names:
    /// double-quoted parts are taken verbatim with `""` as a literal quote,
    /// unquoted parts fold to lower case, and only unquoted dots split.
    /// Anything else is kept whole as an unqualified name.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match split_identifiers(input).as_slice() {
            [name] if !name.is_empty() => Self::unqualified(name.as_str()),
            [schema, name] if !schema.is_empty() && !name.is_empty() => {
                Self::new(schema.as_str(), name.as_str())
            }
            _ => Self::unqualified(input),
        }
    }

    pub fn schema_or_default(&self) -> &str {
        self.schema.as_deref().unwrap_or("public")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => write!(f, "{}", quote_ident(&self.name)),
        }
    }
}

fn split_identifiers(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => quoted = !quoted,
            '.' if !quoted => parts.push(std::mem::take(&mut current)),
            c if quoted => current.push(c),
            c if c.is_whitespace() => {}
            c => current.extend(c.to_lowercase()),
        }
    }
    parts.push(current);
    parts
}

/// Quote identifier for safe SQL representation (PostgreSQL style).
/// Doubles any embedded double quotes and wraps in double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape string literal for display (PostgreSQL quote_literal equivalent).
/// Doubles any embedded single quotes and wraps in single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

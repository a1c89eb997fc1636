//! Statement classification and row-limit rewriting.
//!
//! Both are lexical heuristics: `has_row_limit` only looks at the tail of the
//! statement, so a LIMIT inside a subquery or one followed by `FOR UPDATE` is
//! not seen.

use crate::sql_lexer::{scan, strip_comments};

pub const DEFAULT_ROW_LIMIT: usize = 100;

/// Leading keywords that change data or schema.
pub const MUTATING_KEYWORDS: &[&str] = &[
    "INSERT",
    "UPDATE",
    "DELETE",
    "MERGE",
    "TRUNCATE",
    "DROP",
    "ALTER",
    "CREATE",
    "GRANT",
    "REVOKE",
    "VACUUM",
    "REINDEX",
    "CLUSTER",
    "COPY",
    "REFRESH MATERIALIZED VIEW",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

impl StatementKind {
    pub fn is_write(self) -> bool {
        self == Self::Write
    }
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(str::to_uppercase)
}

/// First significant keyword, uppercased. `REFRESH MATERIALIZED VIEW` is
/// reported as one keyword.
pub fn leading_keyword(statement: &str) -> Option<String> {
    let stripped = strip_comments(statement);
    let trimmed = stripped.trim_start();
    if !trimmed.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        return None;
    }

    let mut iter = words(trimmed);
    let first = iter.next()?;
    if first == "REFRESH" {
        let rest: Vec<String> = iter.take(2).collect();
        if rest == ["MATERIALIZED", "VIEW"] {
            return Some("REFRESH MATERIALIZED VIEW".to_string());
        }
    }
    Some(first)
}

/// `Read` iff the statement starts with `SELECT` or `WITH`; everything else
/// is treated as a write and should be confirmed before running.
pub fn classify(statement: &str) -> StatementKind {
    match leading_keyword(statement).as_deref() {
        Some("SELECT" | "WITH") => StatementKind::Read,
        _ => StatementKind::Write,
    }
}

/// The recognised mutating keyword a statement starts with, for confirmation
/// prompts. `None` for reads and for statements starting with anything else.
pub fn mutating_keyword(statement: &str) -> Option<&'static str> {
    let keyword = leading_keyword(statement)?;
    MUTATING_KEYWORDS.iter().copied().find(|k| *k == keyword)
}

fn is_count(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit())
}

/// True when the statement ends with `LIMIT n`, `LIMIT n OFFSET m` or
/// `FETCH FIRST|NEXT [n] ROW|ROWS ONLY`, ignoring trailing whitespace,
/// comments and one semicolon.
pub fn has_row_limit(statement: &str) -> bool {
    let stripped = strip_comments(statement);
    let mut tail = stripped.trim_end();
    tail = tail.strip_suffix(';').unwrap_or(tail).trim_end();

    let last: Vec<String> = tail
        .split_whitespace()
        .rev()
        .take(6)
        .map(str::to_uppercase)
        .collect();
    let last: Vec<&str> = last.iter().map(String::as_str).collect();

    match last.as_slice() {
        [n, "LIMIT", ..] => is_count(n) || *n == "ALL",
        [m, "OFFSET", n, "LIMIT", ..] => is_count(m) && (is_count(n) || *n == "ALL"),
        ["ONLY", "ROW" | "ROWS", n, "FIRST" | "NEXT", "FETCH", ..] => is_count(n),
        ["ONLY", "ROW" | "ROWS", "FIRST" | "NEXT", "FETCH", ..] => true,
        _ => false,
    }
}

/// Appends ` LIMIT n` to a statement that has none.
///
/// The clause goes right after the last live token, so a trailing semicolon
/// stays at the end and a trailing comment cannot swallow the clause.
/// Whitespace between the last token and the semicolon is dropped.
pub fn add_row_limit(statement: &str, limit: usize) -> String {
    if has_row_limit(statement) {
        return statement.to_string();
    }

    let live: Vec<_> = scan(statement)
        .into_iter()
        .filter(|c| !c.ch.is_whitespace() && !c.state.is_comment())
        .collect();

    let (at, resume) = match live.as_slice() {
        [] => return statement.to_string(),
        [only] if only.is_live() && only.ch == ';' => return statement.to_string(),
        [.., before, last] if last.is_live() && last.ch == ';' => {
            let at = before.offset + before.ch.len_utf8();
            let gap = &statement[at..last.offset];
            (at, if gap.trim().is_empty() { last.offset } else { at })
        }
        [.., last] => {
            let at = last.offset + last.ch.len_utf8();
            (at, at)
        }
    };

    format!("{} LIMIT {}{}", &statement[..at], limit, &statement[resume..])
}

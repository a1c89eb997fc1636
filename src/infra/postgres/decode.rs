//! Text-protocol values to JSON, and driver errors to port errors.

use serde_json::{Number, Value};
use tokio_postgres::SimpleQueryMessage;
use tokio_postgres::error::SqlState;

use crate::app::ports::{DbError, RawColumn, RawResultSet};
use crate::domain::pg_type;

fn decode_number(text: &str) -> Option<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Number(Number::from(i)));
    }
    let number = Number::from_f64(text.parse::<f64>().ok()?)?;
    // numeric keeps digits f64 would lose
    (number.to_string() == text).then_some(Value::Number(number))
}

/// Decodes one text-format value using the column's type id.
pub fn decode_text(text: Option<&str>, type_oid: u32) -> Value {
    let Some(text) = text else {
        return Value::Null;
    };

    if pg_type::is_bool(type_oid) {
        match text {
            "t" => return Value::Bool(true),
            "f" => return Value::Bool(false),
            _ => {}
        }
    } else if pg_type::is_numeric(type_oid) {
        if let Some(number) = decode_number(text) {
            return number;
        }
    } else if pg_type::is_json(type_oid)
        && let Ok(json) = serde_json::from_str::<Value>(text)
        // string and null scalars keep their JSON text
        && !(json.is_string() || json.is_null())
    {
        return json;
    }

    Value::String(text.to_string())
}

/// Builds a result set from simple-query messages. `described` holds the
/// columns reported by describing the statement, when that succeeded;
/// otherwise names come from the rows and types stay unknown.
pub fn collect_result_set(
    described: Option<Vec<RawColumn>>,
    messages: Vec<SimpleQueryMessage>,
) -> RawResultSet {
    let mut columns = described.unwrap_or_default();
    let mut rows = Vec::new();
    let mut rows_affected = None;

    for message in messages {
        match message {
            SimpleQueryMessage::Row(row) => {
                if columns.is_empty() {
                    columns = row
                        .columns()
                        .iter()
                        .map(|c| RawColumn::new(c.name(), 0))
                        .collect();
                }
                let values = (0..row.len())
                    .map(|idx| {
                        let oid = columns.get(idx).map_or(0, |c| c.type_oid);
                        decode_text(row.get(idx), oid)
                    })
                    .collect();
                rows.push(values);
            }
            SimpleQueryMessage::CommandComplete(count) => rows_affected = Some(count),
            _ => {}
        }
    }

    RawResultSet {
        columns,
        rows,
        rows_affected,
    }
}

/// Maps a driver error, keeping the server's message and detail.
pub fn map_error(error: tokio_postgres::Error) -> DbError {
    if let Some(db) = error.as_db_error() {
        if *db.code() == SqlState::QUERY_CANCELED && db.message().contains("user request") {
            return DbError::Cancelled;
        }
        let message = match db.detail() {
            Some(detail) => format!("{} ({detail})", db.message()),
            None => db.message().to_string(),
        };
        return DbError::Query(message);
    }

    if error.is_closed() {
        DbError::Connection(error.to_string())
    } else {
        DbError::Query(error.to_string())
    }
}

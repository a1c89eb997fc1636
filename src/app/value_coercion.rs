//! Type-aware conversion of edited cell text into bindable values, and the
//! literal rendering used for history display.
//!
//! Display literals are never sent to the server; statements always go out
//! with positional parameters.

use serde_json::{Number, Value};

use crate::domain::column::base_type_name;
use crate::domain::table::quote_literal;

const NUMERIC_TYPES: &[&str] = &[
    "smallint",
    "integer",
    "int",
    "int2",
    "int4",
    "int8",
    "bigint",
    "real",
    "float4",
    "float8",
    "double precision",
    "numeric",
    "decimal",
];

const INTEGER_TYPES: &[&str] = &[
    "smallint",
    "integer",
    "int",
    "int2",
    "int4",
    "int8",
    "bigint",
];

/// Arbitrary-precision types keep their text when `f64` cannot carry it.
const EXACT_TYPES: &[&str] = &["numeric", "decimal"];

const BOOLEAN_TYPES: &[&str] = &["boolean", "bool"];

const JSON_TYPES: &[&str] = &["json", "jsonb"];

fn parse_number(text: &str, column_type: &str) -> Option<Number> {
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::from(i));
    }
    let f = trimmed.parse::<f64>().ok()?;

    // Integer input rejects `10.0`, so whole values go out without a fraction
    if INTEGER_TYPES.contains(&column_type) {
        let whole = f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64;
        return whole.then(|| Number::from(f as i64));
    }

    let number = Number::from_f64(f)?;
    if EXACT_TYPES.contains(&column_type) && number.to_string() != trimmed {
        return None;
    }
    Some(number)
}

/// Parsed JSON for binding. Scalars that would lose their JSON form in
/// text (strings and `null`) are kept as their serialised text.
fn parse_json(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text).ok()? {
        scalar @ (Value::String(_) | Value::Null) => Some(Value::String(scalar.to_string())),
        parsed => Some(parsed),
    }
}

/// Converts an edited value for binding against a column of `column_type`.
///
/// Empty strings and nulls become null. Text that does not parse as the
/// column's type passes through unchanged so the server can reject it with
/// its own message.
pub fn coerce_for_bind(raw: &Value, column_type: &str) -> Value {
    let text = match raw {
        Value::Null => return Value::Null,
        Value::String(s) if s.is_empty() => return Value::Null,
        Value::String(s) => s,
        other => return other.clone(),
    };

    let base = base_type_name(column_type);
    let base = base.as_str();

    if JSON_TYPES.contains(&base) {
        return parse_json(text).unwrap_or_else(|| raw.clone());
    }

    if BOOLEAN_TYPES.contains(&base) {
        return match text.to_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => raw.clone(),
        };
    }

    if NUMERIC_TYPES.contains(&base) {
        return parse_number(text, base)
            .map_or_else(|| raw.clone(), Value::Number);
    }

    raw.clone()
}

/// Renders a bound value as a SQL literal for history and audit text.
pub fn literal_for_display(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_literal(s),
        Value::Array(_) | Value::Object(_) => quote_literal(&value.to_string()),
    }
}

/// Text form of a value as sent to the server for a text-format parameter.
pub fn bind_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

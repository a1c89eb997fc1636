//! Parameterised UPDATE / INSERT / DELETE construction for row changes.
//!
//! Values are always bound as positional parameters. [`WriteStatement::display_sql`]
//! renders the same statement with literals substituted, for history only.

use serde_json::Value;

use crate::domain::table::quote_ident;
use crate::domain::{ColumnMeta, Row, TableName};
use crate::sql_lexer::scan;
use crate::value_coercion::{coerce_for_bind, literal_for_display};

#[derive(Debug, Clone, PartialEq)]
pub struct WriteStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl WriteStatement {
    /// The statement with each live `$n` replaced by its parameter's literal.
    pub fn display_sql(&self) -> String {
        let scanned = scan(&self.sql);
        let mut out = String::with_capacity(self.sql.len());
        let mut i = 0;

        while i < scanned.len() {
            let sc = scanned[i];
            if sc.is_live() && sc.ch == '$' {
                let digits: String = scanned[i + 1..]
                    .iter()
                    .take_while(|c| c.is_live() && c.ch.is_ascii_digit())
                    .map(|c| c.ch)
                    .collect();
                if let Ok(n) = digits.parse::<usize>()
                    && let Some(value) = n.checked_sub(1).and_then(|idx| self.params.get(idx))
                {
                    out.push_str(&literal_for_display(value));
                    i += 1 + digits.len();
                    continue;
                }
            }
            out.push(sc.ch);
            i += 1;
        }

        out
    }
}

fn column_type<'a>(columns: &'a [ColumnMeta], name: &str) -> &'a str {
    columns
        .iter()
        .find(|c| c.name == name)
        .map_or("", |c| c.data_type.as_str())
}

/// `"pk1" = $k AND "pk2" IS NULL ...`, pushing bound key values onto `params`.
fn where_clause(
    primary_key: &[String],
    original: &Row,
    params: &mut Vec<Value>,
) -> Result<String, String> {
    let mut predicates = Vec::with_capacity(primary_key.len());
    for column in primary_key {
        match original.get(column) {
            None => {
                return Err(format!(
                    "missing primary key value for column {}",
                    quote_ident(column)
                ));
            }
            // `= NULL` never matches
            Some(Value::Null) => predicates.push(format!("{} IS NULL", quote_ident(column))),
            Some(value) => {
                params.push(value.clone());
                predicates.push(format!("{} = ${}", quote_ident(column), params.len()));
            }
        }
    }
    Ok(predicates.join(" AND "))
}

/// `Ok(None)` when no column was modified.
pub fn build_update(
    table: &TableName,
    columns: &[ColumnMeta],
    primary_key: &[String],
    original: &Row,
    updated: &Row,
    modified_columns: &[String],
) -> Result<Option<WriteStatement>, String> {
    if modified_columns.is_empty() {
        return Ok(None);
    }

    let mut params = Vec::with_capacity(modified_columns.len() + primary_key.len());
    let mut assignments = Vec::with_capacity(modified_columns.len());
    for column in modified_columns {
        let raw = updated.get(column).unwrap_or(&Value::Null);
        params.push(coerce_for_bind(raw, column_type(columns, column)));
        assignments.push(format!("{} = ${}", quote_ident(column), params.len()));
    }
    let predicate = where_clause(primary_key, original, &mut params)?;

    Ok(Some(WriteStatement {
        sql: format!(
            "UPDATE {table} SET {} WHERE {predicate}",
            assignments.join(", ")
        ),
        params,
    }))
}

/// Includes every column of `values` except those holding an empty string.
/// Known columns come first, in table order.
pub fn build_insert(table: &TableName, columns: &[ColumnMeta], values: &Row) -> WriteStatement {
    let known = columns
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| values.contains_key(*name));
    let extra = values
        .keys()
        .map(String::as_str)
        .filter(|name| !columns.iter().any(|c| c.name == *name));

    let included: Vec<&str> = known
        .chain(extra)
        .filter(|name| !matches!(values.get(*name), Some(Value::String(s)) if s.is_empty()))
        .collect();

    if included.is_empty() {
        return WriteStatement {
            sql: format!("INSERT INTO {table} DEFAULT VALUES"),
            params: Vec::new(),
        };
    }

    let params = included
        .iter()
        .map(|name| {
            let raw = values.get(*name).unwrap_or(&Value::Null);
            coerce_for_bind(raw, column_type(columns, name))
        })
        .collect();
    let column_list = included
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=included.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");

    WriteStatement {
        sql: format!("INSERT INTO {table} ({column_list}) VALUES ({placeholders})"),
        params,
    }
}

pub fn build_delete(
    table: &TableName,
    primary_key: &[String],
    original: &Row,
) -> Result<WriteStatement, String> {
    let mut params = Vec::with_capacity(primary_key.len());
    let predicate = where_clause(primary_key, original, &mut params)?;
    Ok(WriteStatement {
        sql: format!("DELETE FROM {table} WHERE {predicate}"),
        params,
    })
}

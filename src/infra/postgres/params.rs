use std::error::Error;

use bytes::BytesMut;
use serde_json::Value;
use tokio_postgres::types::{Format, IsNull, ToSql, Type, to_sql_checked};

use crate::app::value_coercion::bind_text;

/// A parameter sent in text format, so the server parses it as whatever
/// type the statement expects at that position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextParam(Option<String>);

impl TextParam {
    pub fn from_value(value: &Value) -> Self {
        Self(bind_text(value))
    }
}

impl ToSql for TextParam {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match &self.0 {
            Some(text) => {
                out.extend_from_slice(text.as_bytes());
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, _ty: &Type) -> Format {
        Format::Text
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(value: &Value, ty: &Type) -> (IsNull, BytesMut) {
        let mut out = BytesMut::new();
        let is_null = TextParam::from_value(value).to_sql(ty, &mut out).unwrap();
        (is_null, out)
    }

    #[test]
    fn strings_are_sent_verbatim() {
        let (is_null, out) = encode(&json!("O'Reilly"), &Type::TEXT);

        assert!(matches!(is_null, IsNull::No));
        assert_eq!(&out[..], b"O'Reilly");
    }

    #[test]
    fn scalars_and_json_use_their_text_form() {
        assert_eq!(&encode(&json!(42), &Type::INT4).1[..], b"42");
        assert_eq!(&encode(&json!(true), &Type::BOOL).1[..], b"true");
        assert_eq!(&encode(&json!({"a": [1]}), &Type::JSONB).1[..], b"{\"a\":[1]}");
    }

    #[test]
    fn null_is_sql_null() {
        let (is_null, out) = encode(&Value::Null, &Type::INT8);

        assert!(matches!(is_null, IsNull::Yes));
        assert!(out.is_empty());
    }

    #[test]
    fn every_type_is_accepted_in_text_format() {
        let param = TextParam::from_value(&json!("2024-01-01"));

        assert!(TextParam::accepts(&Type::DATE));
        assert!(matches!(param.encode_format(&Type::DATE), Format::Text));
    }
}

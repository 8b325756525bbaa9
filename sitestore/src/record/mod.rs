use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A schema-less record. Stored records always carry `id`, `created_at` and
/// `updated_at`; every other field belongs to the caller.
pub type Record = Map<String, Value>;

pub const ID: &str = "id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Fields the store owns; caller-supplied values for them are ignored on create
/// and update.
pub(crate) const RESERVED_FIELDS: [&str; 3] = [ID, CREATED_AT, UPDATED_AT];

/// One page of results from `TableHandle::get_paginated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// The record's id as a string, if it has one.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID).and_then(Value::as_str)
}

/// Text form of a scalar: strings as-is, numbers and booleans as JSON text.
/// Null, arrays and objects have no scalar text.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Text searched by `TableHandle::search`. Like `scalar_text`, but nested
/// values are searched through their JSON rendering.
pub fn search_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
        scalar => scalar_text(scalar),
    }
}

/// Equality that tolerates `5` vs `"5"` and `true` vs `1`: values match if they
/// are equal, if one is a boolean and the other its 0/1 number, or if both are
/// scalars with the same text.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Bool(flag), Value::Number(n)) | (Value::Number(n), Value::Bool(flag)) => {
            return n.as_f64() == Some(if *flag { 1.0 } else { 0.0 });
        }
        _ => {}
    }
    match (scalar_text(a), scalar_text(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Truthiness as web clients understand it: `false`, `0`, `""` and `null` are
/// falsy, everything else is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numeric view of a value for ordering; strings are parsed, anything else is 0.
pub fn numeric_value(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Value::Bool(true)) => 1.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loose_eq() {
        assert!(loose_eq(&json!("5"), &json!(5)));
        assert!(loose_eq(&json!(5), &json!(5)));
        assert!(loose_eq(&json!("about"), &json!("about")));
        assert!(!loose_eq(&json!("5"), &json!(6)));
        assert!(!loose_eq(&json!(null), &json!("null")));
        assert!(loose_eq(&json!(true), &json!(1)));
        assert!(loose_eq(&json!(0), &json!(false)));
        assert!(!loose_eq(&json!(true), &json!(0)));
        assert!(!loose_eq(&json!(false), &json!(2)));
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("yes")));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(null)));
    }

    #[test]
    fn test_search_text() {
        assert_eq!(search_text(&json!("Demo")), Some("Demo".into()));
        assert_eq!(search_text(&json!(42)), Some("42".into()));
        assert_eq!(search_text(&json!(["demo"])), Some("[\"demo\"]".into()));
        assert_eq!(search_text(&json!(null)), None);
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(numeric_value(Some(&json!(3))), 3.0);
        assert_eq!(numeric_value(Some(&json!("2"))), 2.0);
        assert_eq!(numeric_value(Some(&json!("abc"))), 0.0);
        assert_eq!(numeric_value(None), 0.0);
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let page: Page<Record> = Page {
            items: vec![],
            total: 0,
            page: 1,
            limit: 10,
            total_pages: 0,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalPages"], 0);
    }
}

//! Field values and the flat value object.
//!
//! Widgets operate on rich values (notably date objects for picker UIs) while
//! wire payloads are plain JSON. [`FieldValue`] is the union both sides share;
//! the engine's time transform layer is the only place that materializes the
//! `DateTime` variant from wire strings.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Wire format used when a rich date value is rendered back into JSON.
pub const DATETIME_WIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The value of a single form field.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// Absent / cleared value.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Multi-valued fields: checkbox groups, cascader paths, date ranges.
    List(Vec<FieldValue>),
    /// Widget-internal date representation. Never produced by JSON
    /// deserialization; only the time transform layer creates it.
    DateTime(NaiveDateTime),
}

/// The flat value object a form binds against. Insertion-ordered so emitted
/// snapshots are deterministic.
pub type ValueMap = IndexMap<String, FieldValue>;

impl FieldValue {
    /// Emptiness as the required rule sees it: null, empty string, empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::DateTime(datetime) => Some(*datetime),
            _ => None,
        }
    }

    /// Textual rendering used for pattern rules and display fallbacks.
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(flag) => flag.to_string(),
            FieldValue::Int(number) => number.to_string(),
            FieldValue::Float(number) => number.to_string(),
            FieldValue::Text(text) => text.clone(),
            FieldValue::List(items) => items.iter().map(FieldValue::to_text).collect::<Vec<_>>().join(","),
            FieldValue::DateTime(datetime) => datetime.format(DATETIME_WIRE_FORMAT).to_string(),
        }
    }

    /// Converts a JSON value into a field value. Strings stay strings; the
    /// time transform layer decides which of them become dates.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => FieldValue::Null,
            JsonValue::Bool(flag) => FieldValue::Bool(flag),
            JsonValue::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    FieldValue::Int(integer)
                } else {
                    FieldValue::Float(number.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(text) => FieldValue::Text(text),
            JsonValue::Array(items) => FieldValue::List(items.into_iter().map(FieldValue::from_json).collect()),
            JsonValue::Object(_) => FieldValue::Text(value.to_string()),
        }
    }

    /// Renders the value back into JSON. `DateTime` values become wire
    /// strings in the default datetime format.
    pub fn to_json(&self) -> JsonValue {
        match self {
            FieldValue::Null => JsonValue::Null,
            FieldValue::Bool(flag) => JsonValue::Bool(*flag),
            FieldValue::Int(number) => JsonValue::from(*number),
            FieldValue::Float(number) => serde_json::Number::from_f64(*number).map(JsonValue::Number).unwrap_or(JsonValue::Null),
            FieldValue::Text(text) => JsonValue::String(text.clone()),
            FieldValue::List(items) => JsonValue::Array(items.iter().map(FieldValue::to_json).collect()),
            FieldValue::DateTime(datetime) => JsonValue::String(datetime.format(DATETIME_WIRE_FORMAT).to_string()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(FieldValue::from_json(JsonValue::deserialize(deserializer)?))
    }
}

impl From<&str> for FieldValue {
    fn from(text: &str) -> Self {
        FieldValue::Text(text.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(text: String) -> Self {
        FieldValue::Text(text)
    }
}

impl From<i64> for FieldValue {
    fn from(number: i64) -> Self {
        FieldValue::Int(number)
    }
}

impl From<f64> for FieldValue {
    fn from(number: f64) -> Self {
        FieldValue::Float(number)
    }
}

impl From<bool> for FieldValue {
    fn from(flag: bool) -> Self {
        FieldValue::Bool(flag)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(datetime: NaiveDateTime) -> Self {
        FieldValue::DateTime(datetime)
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(items: Vec<FieldValue>) -> Self {
        FieldValue::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn emptiness_matches_required_semantics() {
        assert!(FieldValue::Null.is_empty());
        assert!(FieldValue::Text(String::new()).is_empty());
        assert!(FieldValue::List(vec![]).is_empty());
        assert!(!FieldValue::Bool(false).is_empty());
        assert!(!FieldValue::Int(0).is_empty());
        assert!(!FieldValue::Text("x".into()).is_empty());
    }

    #[test]
    fn json_round_trip_preserves_scalars() {
        let values = [
            FieldValue::Null,
            FieldValue::Bool(true),
            FieldValue::Int(42),
            FieldValue::Text("hello".into()),
            FieldValue::List(vec![FieldValue::Int(1), FieldValue::Int(2)]),
        ];
        for value in values {
            assert_eq!(FieldValue::from_json(value.to_json()), value);
        }
    }

    #[test]
    fn datetime_serializes_as_wire_string() {
        let datetime = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(8, 30, 0).unwrap();
        assert_eq!(
            FieldValue::DateTime(datetime).to_json(),
            serde_json::json!("2024-03-01 08:30:00")
        );
    }

    #[test]
    fn json_never_produces_datetime() {
        let value = FieldValue::from_json(serde_json::json!("2024-03-01 08:30:00"));
        assert_eq!(value, FieldValue::Text("2024-03-01 08:30:00".into()));
    }
}

//! Field values as seen by the diff engine.

use crate::model::entity_ref::EntityId;
use crate::settings::AuditSettings;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Logged attributes of one entity, keyed by field name
pub type Snapshot = BTreeMap<String, FieldValue>;

/// The stored representation of a single field
///
/// Equality is plain value equality; the diff engine never looks inside
/// nested structures.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
    /// Primary key of a related entity
    Ref(EntityId),
}

impl FieldValue {
    /// Reference to a related entity, `Null` when unset
    pub fn reference(id: Option<EntityId>) -> Self {
        id.map_or(FieldValue::Null, FieldValue::Ref)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Primary key carried by this value, if it is usable as one
    pub fn as_entity_id(&self) -> Option<EntityId> {
        match self {
            FieldValue::Ref(id) | FieldValue::Int(id) => Some(*id),
            _ => None,
        }
    }

    /// Encode for storage in a log entry
    ///
    /// The log is stored as JSON, which has no temporal type, so dates and
    /// times are localized to strings here.
    pub fn encode(&self, settings: &AuditSettings) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Int(i) | FieldValue::Ref(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Date(d) => Value::String(settings.localize_date(d)),
            FieldValue::Time(t) => Value::String(settings.localize_time(t)),
            FieldValue::DateTime(dt) => Value::String(settings.localize_datetime(dt)),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<NaiveTime> for FieldValue {
    fn from(value: NaiveTime) -> Self {
        FieldValue::Time(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::DateTime(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporal_values_encode_as_localized_strings() {
        let settings = AuditSettings::default();
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

        assert_eq!(
            FieldValue::Date(date).encode(&settings),
            Value::String("Mar. 1, 2026".to_string())
        );
        assert_eq!(
            FieldValue::Time(NaiveTime::from_hms_opt(9, 5, 0).unwrap()).encode(&settings),
            Value::String("09:05".to_string())
        );
    }

    #[test]
    fn test_option_conversion_maps_none_to_null() {
        let none: Option<&str> = None;
        assert!(FieldValue::from(none).is_null());
        assert_eq!(FieldValue::from(Some("x")), FieldValue::Text("x".into()));
    }

    #[test]
    fn test_non_finite_float_encodes_as_null() {
        let settings = AuditSettings::default();
        assert_eq!(FieldValue::Float(f64::NAN).encode(&settings), Value::Null);
    }
}

//! Dynamic values exchanged between entities and storage backends.
//!
//! [`Value`] is what an entity property reads as and what a backend binds or
//! stores. Equality is deep and structural, which is what change tracking and
//! the memory backend rely on. A property that is not set at all reads as
//! `None` rather than [`Value::Null`].

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fmt,
};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use relmap_utils::time::{
    format_date, format_time, format_timestamp, parse_date, parse_time, parse_timestamp,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A single property or column value.
///
/// Serializes untagged, so a record serializes to plain JSON. When
/// deserializing, strings always become [`Value::Text`]; temporal values are
/// recovered through [`PropertyValue`] conversions or temporal metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    List(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(v) => Some(v),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::Date(_) => 4,
            Value::Time(_) => 5,
            Value::Timestamp(_) => 6,
            Value::List(_) => 7,
            Value::Record(_) => 8,
        }
    }

    /// Converts into a JSON value. Temporal values become their SQL text
    /// form and non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(*v),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(v) => serde_json::Value::String(v.clone()),
            Value::Date(v) => serde_json::Value::String(format_date(v)),
            Value::Time(v) => serde_json::Value::String(format_time(v)),
            Value::Timestamp(v) => serde_json::Value::String(format_timestamp(v)),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(record) => serde_json::Value::Object(
                record
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.partial_cmp(b),
            (Value::Time(a), Value::Time(b)) => a.partial_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.partial_cmp(b),
            (Value::List(a), Value::List(b)) => a.partial_cmp(b),
            (Value::Record(a), Value::Record(b)) => a.partial_cmp(b),
            (a, b) => a.rank().partial_cmp(&b.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Value::Date(v) => write!(f, "'{}'", format_date(v)),
            Value::Time(v) => write!(f, "'{}'", format_time(v)),
            Value::Timestamp(v) => write!(f, "'{}'", format_timestamp(v)),
            Value::List(_) | Value::Record(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(v) => Value::Bool(v),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(v) => Value::Int(v),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(v) => Value::Text(v),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Record(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_for_value!(
    bool => Bool,
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Float,
    String => Text,
    &str => Text,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    Vec<Value> => List,
    Record => Record,
);

/// A plain data object: property (or column) name to value.
#[derive(Debug, Clone, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Conversion between a Rust field type and [`Value`].
///
/// `to_value` returning `None` means the property is unset. Only `Option<T>`
/// does that; every other implementation always has a value.
pub trait PropertyValue: Sized {
    fn to_value(&self) -> Option<Value>;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T>(expected: &'static str, found: &Value) -> Result<T> {
    Err(CoreError::TypeMismatch {
        expected,
        found: found.type_name(),
    })
}

macro_rules! impl_integer_property {
    ($($ty:ty),*) => {
        $(
            impl PropertyValue for $ty {
                fn to_value(&self) -> Option<Value> {
                    i64::try_from(*self).ok().map(Value::Int)
                }

                fn from_value(value: Value) -> Result<Self> {
                    let raw = match value {
                        Value::Int(v) => v,
                        Value::Text(ref text) => match text.trim().parse::<i64>() {
                            Ok(v) => v,
                            Err(_) => return mismatch(stringify!($ty), &value),
                        },
                        other => return mismatch(stringify!($ty), &other),
                    };
                    <$ty>::try_from(raw).map_err(|_| CoreError::OutOfRange {
                        target: stringify!($ty),
                        value: raw.to_string(),
                    })
                }
            }
        )*
    };
}

impl_integer_property!(i64, i32, i16, u8, u16, u32, u64);

impl PropertyValue for f64 {
    fn to_value(&self) -> Option<Value> {
        Some(Value::Float(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            Value::Text(ref text) => text
                .trim()
                .parse::<f64>()
                .or_else(|_| mismatch("f64", &value)),
            other => mismatch("f64", &other),
        }
    }
}

impl PropertyValue for bool {
    fn to_value(&self) -> Option<Value> {
        Some(Value::Bool(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => mismatch("bool", &other),
        }
    }
}

impl PropertyValue for String {
    fn to_value(&self) -> Option<Value> {
        Some(Value::Text(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            other => mismatch("String", &other),
        }
    }
}

impl PropertyValue for NaiveDate {
    fn to_value(&self) -> Option<Value> {
        Some(Value::Date(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(v) => Ok(v),
            Value::Timestamp(v) => Ok(v.date()),
            Value::Text(text) => Ok(parse_date(&text)?),
            other => mismatch("NaiveDate", &other),
        }
    }
}

impl PropertyValue for NaiveTime {
    fn to_value(&self) -> Option<Value> {
        Some(Value::Time(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Time(v) => Ok(v),
            Value::Timestamp(v) => Ok(v.time()),
            Value::Text(text) => Ok(parse_time(&text)?),
            other => mismatch("NaiveTime", &other),
        }
    }
}

impl PropertyValue for NaiveDateTime {
    fn to_value(&self) -> Option<Value> {
        Some(Value::Timestamp(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(v) => Ok(v),
            Value::Date(v) => Ok(v.and_time(NaiveTime::MIN)),
            Value::Text(text) => Ok(parse_timestamp(&text)?),
            other => mismatch("NaiveDateTime", &other),
        }
    }
}

impl PropertyValue for Value {
    fn to_value(&self) -> Option<Value> {
        Some(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl PropertyValue for Record {
    fn to_value(&self) -> Option<Value> {
        Some(Value::Record(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Record(v) => Ok(v),
            other => mismatch("Record", &other),
        }
    }
}

impl<T: PropertyValue> PropertyValue for Vec<T> {
    fn to_value(&self) -> Option<Value> {
        Some(Value::List(
            self.iter()
                .map(|item| item.to_value().unwrap_or(Value::Null))
                .collect(),
        ))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => mismatch("list", &other),
        }
    }
}

impl<T: PropertyValue> PropertyValue for Option<T> {
    fn to_value(&self) -> Option<Value> {
        self.as_ref().and_then(T::to_value)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_equality() {
        let a = Value::Record(Record::new().with("tags", vec![Value::from("a")]));
        let b = Value::Record(Record::new().with("tags", vec![Value::from("a")]));
        let c = Value::Record(Record::new().with("tags", vec![Value::from("b")]));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_ordering_across_numeric_types() {
        assert!(Value::Int(1) < Value::Float(1.5));
        assert!(Value::Float(2.5) > Value::Int(2));
        assert!(Value::Null < Value::Int(0));
        assert!(Value::from("Bar 123") < Value::from("Bar 456"));
    }

    #[test]
    fn test_option_property_value() {
        let unset: Option<String> = None;
        assert_eq!(unset.to_value(), None);
        assert_eq!(Option::<String>::from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(Value::from("x")).unwrap(),
            Some("x".to_string())
        );
    }

    #[test]
    fn test_integer_conversions() {
        assert_eq!(i32::from_value(Value::Int(42)).unwrap(), 42);
        assert_eq!(i64::from_value(Value::from("17")).unwrap(), 17);
        assert!(matches!(
            u8::from_value(Value::Int(300)),
            Err(CoreError::OutOfRange { target: "u8", .. })
        ));
        assert!(matches!(
            i64::from_value(Value::Bool(true)),
            Err(CoreError::TypeMismatch {
                expected: "i64",
                found: "bool"
            })
        ));
    }

    #[test]
    fn test_temporal_from_text() {
        let date = NaiveDate::from_value(Value::from("2024-01-31")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());

        let ts = NaiveDateTime::from_value(Value::from("2024-01-31 10:11:12")).unwrap();
        assert_eq!(ts.date(), date);
        assert!(NaiveTime::from_value(Value::from("noon")).is_err());
    }

    #[test]
    fn test_bool_from_tinyint() {
        assert!(bool::from_value(Value::Int(1)).unwrap());
        assert!(!bool::from_value(Value::Int(0)).unwrap());
        assert!(bool::from_value(Value::Int(2)).is_err());
    }

    #[test]
    fn test_json_round_trip_of_plain_values() {
        let json = serde_json::json!({"barName": "Bar 123", "count": 3, "tags": ["x"]});
        let value = Value::from(json.clone());
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_display_quotes_text() {
        assert_eq!(Value::from("O'Brien").to_string(), "'O''Brien'");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(
            Value::Date(NaiveDate::from_ymd_opt(2020, 5, 1).unwrap()).to_string(),
            "'2020-05-01'"
        );
    }
}

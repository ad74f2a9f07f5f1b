//! The protocol-neutral cell value.
//!
//! Both transports decode their wire representation into [`Value`]: Bolt via
//! [`bolt`](crate::bolt), REST via [`json`](crate::json). Query parameters are
//! bound as [`Value`] and encoded back per transport.

use std::collections::{BTreeMap, HashMap};

/// One cell of a result row, or one bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Node(NodeCell),
    Relationship(RelationshipCell),
    Path(PathCell),
    Date(chrono::NaiveDate),
    LocalTime(chrono::NaiveTime),
    Time(chrono::NaiveTime, chrono::FixedOffset),
    LocalDateTime(chrono::NaiveDateTime),
    DateTime(chrono::DateTime<chrono::FixedOffset>),
    Duration(std::time::Duration),
}

/// A node as it arrives from the server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeCell {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
}

/// A relationship as it arrives from the server.
///
/// Start and end ids are absent when the wire format does not carry them
/// (path segments, row+meta results).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelationshipCell {
    pub id: i64,
    pub rel_type: String,
    pub start_node_id: Option<i64>,
    pub end_node_id: Option<i64>,
    pub properties: BTreeMap<String, Value>,
}

/// An alternating node/relationship walk.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathCell {
    pub nodes: Vec<NodeCell>,
    pub relationships: Vec<RelationshipCell>,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Build a map value from `(key, value)` pairs.
    pub fn map<K, I>(entries: I) -> Value
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Returns a human-readable name for a [`Value`] variant.
///
/// Used in error messages to describe the actual type received when a
/// conversion fails.
pub fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "Null",
        Value::Boolean(_) => "Boolean",
        Value::Integer(_) => "Integer",
        Value::Float(_) => "Float",
        Value::String(_) => "String",
        Value::Bytes(_) => "Bytes",
        Value::List(_) => "List",
        Value::Map(_) => "Map",
        Value::Node(_) => "Node",
        Value::Relationship(_) => "Relationship",
        Value::Path(_) => "Path",
        Value::Date(_) => "Date",
        Value::LocalTime(_) => "LocalTime",
        Value::Time(..) => "Time",
        Value::LocalDateTime(_) => "LocalDateTime",
        Value::DateTime(_) => "DateTime",
        Value::Duration(_) => "Duration",
    }
}

// ---------------------------------------------------------------------------
// Into<Value> for common Rust types (used for parameter binding)
// ---------------------------------------------------------------------------

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Integer(v as i64)
            }
        })*
    };
}

impl_from_int!(i64, i32, i16, i8, u32, u16, u8, usize);

impl From<u64> for Value {
    /// Values above `i64::MAX` saturate.
    fn from(v: u64) -> Self {
        Value::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(v: HashMap<String, V>) -> Self {
        Value::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(v: BTreeMap<String, V>) -> Self {
        Value::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<chrono::NaiveDate> for Value {
    fn from(v: chrono::NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<chrono::NaiveTime> for Value {
    fn from(v: chrono::NaiveTime) -> Self {
        Value::LocalTime(v)
    }
}

impl From<chrono::NaiveDateTime> for Value {
    fn from(v: chrono::NaiveDateTime) -> Self {
        Value::LocalDateTime(v)
    }
}

impl From<chrono::DateTime<chrono::FixedOffset>> for Value {
    fn from(v: chrono::DateTime<chrono::FixedOffset>) -> Self {
        Value::DateTime(v)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        Value::DateTime(v.into())
    }
}

impl From<std::time::Duration> for Value {
    fn from(v: std::time::Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<NodeCell> for Value {
    fn from(v: NodeCell) -> Self {
        Value::Node(v)
    }
}

impl From<RelationshipCell> for Value {
    fn from(v: RelationshipCell) -> Self {
        Value::Relationship(v)
    }
}

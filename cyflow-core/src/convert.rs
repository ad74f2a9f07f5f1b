//! [`FromCyflowValue`] implementations for standard Rust types.
//!
//! Scalars, strings, and collections accept `Null` and produce their default
//! value; use `Option<T>` to tell "absent" apart from "default".

use std::collections::{BTreeMap, HashMap};

use crate::decode::{decode, DecodeContext};
use crate::error::CyflowError;
use crate::traits::{FromCyflowValue, TargetKind};
use crate::value::{type_name, NodeCell, RelationshipCell, Value};

// ---------------------------------------------------------------------------
// Numeric macro
// ---------------------------------------------------------------------------

macro_rules! impl_from_val_int {
    ($($t:ty),*) => {
        $(impl FromCyflowValue for $t {
            fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
                match value {
                    Value::Integer(v) => <$t>::try_from(v).map_err(|_| {
                        CyflowError::Mapping(format!("{v} does not fit in {}", stringify!($t)))
                    }),
                    Value::Null => Ok(<$t>::default()),
                    other => Err(CyflowError::type_mismatch("Integer", type_name(&other), stringify!($t))),
                }
            }
        })*
    };
}

macro_rules! impl_from_val_float {
    ($($t:ty),*) => {
        $(impl FromCyflowValue for $t {
            fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
                match value {
                    Value::Float(v) => Ok(v as $t),
                    Value::Integer(v) => Ok(v as $t),
                    Value::Null => Ok(<$t>::default()),
                    other => Err(CyflowError::type_mismatch("Float", type_name(&other), stringify!($t))),
                }
            }
        })*
    };
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

impl FromCyflowValue for String {
    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::String(s) => Ok(s),
            Value::Null => Ok(String::new()),
            other => Err(CyflowError::type_mismatch("String", type_name(&other), "String")),
        }
    }
}

impl FromCyflowValue for bool {
    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Boolean(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(CyflowError::type_mismatch("Boolean", type_name(&other), "bool")),
        }
    }
}

impl_from_val_int!(i64, i32, i16, i8, u64, u32, u16, u8, usize);
impl_from_val_float!(f64, f32);

/// Identity conversion, for dynamically shaped results.
impl FromCyflowValue for Value {
    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

impl<T: FromCyflowValue> FromCyflowValue for Vec<T> {
    fn from_value(value: Value, ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::List(xs) => xs.into_iter().map(|x| decode::<T>(x, ctx)).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(CyflowError::type_mismatch("List", type_name(&other), "Vec<T>")),
        }
    }
}

/// `Option<T>` is the "absent vs present" primitive.
/// - `null` maps to `None`.
/// - Otherwise maps to `Some(T)`.
impl<T: FromCyflowValue> FromCyflowValue for Option<T> {
    const KIND: TargetKind = T::KIND;
    const ENTITY: bool = T::ENTITY;

    fn from_value(value: Value, ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Null => Ok(None),
            other => Ok(Some(T::from_value(other, ctx)?)),
        }
    }
}

/// Converts a map into `HashMap<String, V>`. Node and relationship cells
/// convert through their property maps.
impl<V: FromCyflowValue> FromCyflowValue for HashMap<String, V> {
    fn from_value(value: Value, ctx: &DecodeContext) -> Result<Self, CyflowError> {
        let entries = match value {
            Value::Map(m) => m,
            Value::Node(n) => n.properties,
            Value::Relationship(r) => r.properties,
            Value::Null => return Ok(HashMap::new()),
            other => return Err(CyflowError::type_mismatch("Map", type_name(&other), "HashMap<String, V>")),
        };
        let mut out = HashMap::with_capacity(entries.len());
        for (k, v) in entries {
            let converted = decode::<V>(v, ctx).map_err(|e| e.with_context(format!("map key '{k}'")))?;
            out.insert(k, converted);
        }
        Ok(out)
    }
}

impl<V: FromCyflowValue> FromCyflowValue for BTreeMap<String, V> {
    fn from_value(value: Value, ctx: &DecodeContext) -> Result<Self, CyflowError> {
        let map = HashMap::<String, V>::from_value(value, ctx)?;
        Ok(map.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Tuples, for list unpacking such as `RETURN [a.name, count(*)]`
// ---------------------------------------------------------------------------

fn list_of(value: Value, len: usize, target: &str) -> Result<Vec<Value>, CyflowError> {
    match value {
        Value::List(xs) if xs.len() == len => Ok(xs),
        other => Err(CyflowError::type_mismatch(
            &format!("List[{len}]"),
            type_name(&other),
            target,
        )),
    }
}

impl<A: FromCyflowValue, B: FromCyflowValue> FromCyflowValue for (A, B) {
    fn from_value(value: Value, ctx: &DecodeContext) -> Result<Self, CyflowError> {
        let mut xs = list_of(value, 2, "tuple(A, B)")?.into_iter();
        match (xs.next(), xs.next()) {
            (Some(a), Some(b)) => Ok((decode(a, ctx)?, decode(b, ctx)?)),
            _ => Err(CyflowError::Mapping("tuple(A, B) needs two elements".into())),
        }
    }
}

impl<A: FromCyflowValue, B: FromCyflowValue, C: FromCyflowValue> FromCyflowValue for (A, B, C) {
    fn from_value(value: Value, ctx: &DecodeContext) -> Result<Self, CyflowError> {
        let mut xs = list_of(value, 3, "tuple(A, B, C)")?.into_iter();
        match (xs.next(), xs.next(), xs.next()) {
            (Some(a), Some(b), Some(c)) => Ok((decode(a, ctx)?, decode(b, ctx)?, decode(c, ctx)?)),
            _ => Err(CyflowError::Mapping("tuple(A, B, C) needs three elements".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw cells
// ---------------------------------------------------------------------------

impl FromCyflowValue for NodeCell {
    const ENTITY: bool = true;

    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Node(n) => Ok(n),
            other => Err(CyflowError::type_mismatch("Node", type_name(&other), "NodeCell")),
        }
    }
}

impl FromCyflowValue for RelationshipCell {
    const ENTITY: bool = true;

    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Relationship(r) => Ok(r),
            other => Err(CyflowError::type_mismatch("Relationship", type_name(&other), "RelationshipCell")),
        }
    }
}

// ---------------------------------------------------------------------------
// Temporal types (chrono)
//
// String-encoded temporals ("/Date(...)/", ISO-8601) are turned into the
// typed variants by the converters before these impls run.
// ---------------------------------------------------------------------------

impl FromCyflowValue for chrono::NaiveDate {
    const KIND: TargetKind = TargetKind::Date;

    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Date(d) => Ok(d),
            Value::LocalDateTime(dt) => Ok(dt.date()),
            Value::DateTime(dt) => Ok(dt.date_naive()),
            other => Err(CyflowError::type_mismatch("Date", type_name(&other), "NaiveDate")),
        }
    }
}

impl FromCyflowValue for chrono::NaiveTime {
    const KIND: TargetKind = TargetKind::LocalTime;

    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::LocalTime(t) => Ok(t),
            Value::Time(t, _) => Ok(t),
            other => Err(CyflowError::type_mismatch("LocalTime", type_name(&other), "NaiveTime")),
        }
    }
}

/// A time of day with its UTC offset (Cypher `TIME`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWithOffset {
    pub time: chrono::NaiveTime,
    pub offset: chrono::FixedOffset,
}

impl FromCyflowValue for TimeWithOffset {
    const KIND: TargetKind = TargetKind::Time;

    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Time(time, offset) => Ok(TimeWithOffset { time, offset }),
            other => Err(CyflowError::type_mismatch("Time", type_name(&other), "TimeWithOffset")),
        }
    }
}

impl From<TimeWithOffset> for Value {
    fn from(v: TimeWithOffset) -> Self {
        Value::Time(v.time, v.offset)
    }
}

impl FromCyflowValue for chrono::NaiveDateTime {
    const KIND: TargetKind = TargetKind::LocalDateTime;

    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::LocalDateTime(dt) => Ok(dt),
            Value::DateTime(dt) => Ok(dt.naive_local()),
            other => Err(CyflowError::type_mismatch("LocalDateTime", type_name(&other), "NaiveDateTime")),
        }
    }
}

impl FromCyflowValue for chrono::DateTime<chrono::FixedOffset> {
    const KIND: TargetKind = TargetKind::DateTime;

    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            other => Err(CyflowError::type_mismatch("DateTime", type_name(&other), "DateTime<FixedOffset>")),
        }
    }
}

impl FromCyflowValue for chrono::DateTime<chrono::Utc> {
    const KIND: TargetKind = TargetKind::DateTime;

    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::DateTime(dt) => Ok(dt.with_timezone(&chrono::Utc)),
            other => Err(CyflowError::type_mismatch("DateTime", type_name(&other), "DateTime<Utc>")),
        }
    }
}

/// Offsets arrive as whole seconds east of UTC once the time-zone converter has run.
impl FromCyflowValue for chrono::FixedOffset {
    const KIND: TargetKind = TargetKind::TimeZone;

    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Integer(secs) => i32::try_from(secs)
                .ok()
                .and_then(chrono::FixedOffset::east_opt)
                .ok_or_else(|| CyflowError::Mapping(format!("{secs}s is not a valid UTC offset"))),
            Value::DateTime(dt) => Ok(*dt.offset()),
            Value::Time(_, offset) => Ok(offset),
            other => Err(CyflowError::type_mismatch("TimeZone", type_name(&other), "FixedOffset")),
        }
    }
}

impl FromCyflowValue for std::time::Duration {
    const KIND: TargetKind = TargetKind::Duration;

    fn from_value(value: Value, _ctx: &DecodeContext) -> Result<Self, CyflowError> {
        match value {
            Value::Duration(d) => Ok(d),
            Value::Null => Ok(std::time::Duration::default()),
            other => Err(CyflowError::type_mismatch("Duration", type_name(&other), "std::time::Duration")),
        }
    }
}

//! Pluggable cell converters.
//!
//! Wire formats encode some types as strings or integers: the legacy REST API
//! sends dates as `"/Date(1262304000000+0100)/"`, the transactional endpoint
//! sends ISO-8601 text, enums are stored by name. A [`ValueConverter`] claims
//! such a cell for a given [`TargetKind`] and rewrites it into the typed
//! [`Value`] variant the target's [`FromCyflowValue`](crate::traits::FromCyflowValue)
//! impl understands.
//!
//! Converters are tried in registration order; the first one that claims a
//! cell wins. The built-ins come first, in this order:
//!
//! 1. [`MsDateConverter`]
//! 2. [`IsoTemporalConverter`]
//! 3. [`TimeZoneConverter`]
//! 4. [`IsoDurationConverter`]
//! 5. [`EnumNameConverter`]

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};

use crate::error::CyflowError;
use crate::traits::TargetKind;
use crate::value::Value;

/// Reshapes a wire value into the form a target type expects.
pub trait ValueConverter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this converter handles `value` for `target`. Never called with `Null`.
    fn claims(&self, value: &Value, target: &TargetKind) -> bool;

    fn convert(&self, value: Value, target: &TargetKind) -> Result<Value, CyflowError>;
}

/// Ordered set of converters. Clones share the converter instances.
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: Vec<Arc<dyn ValueConverter>>,
}

impl ConverterRegistry {
    /// A registry with no converters at all.
    pub fn empty() -> Self {
        Self { converters: Vec::new() }
    }

    /// Append a converter after the ones already registered.
    pub fn register(&mut self, converter: impl ValueConverter + 'static) -> &mut Self {
        self.converters.push(Arc::new(converter));
        self
    }

    pub fn with(mut self, converter: impl ValueConverter + 'static) -> Self {
        self.register(converter);
        self
    }

    /// Names in precedence order.
    pub fn names(&self) -> Vec<&'static str> {
        self.converters.iter().map(|c| c.name()).collect()
    }

    /// Run the first claiming converter, or return `value` untouched.
    pub fn apply(&self, value: Value, target: &TargetKind) -> Result<Value, CyflowError> {
        if value.is_null() || *target == TargetKind::Other {
            return Ok(value);
        }
        match self.converters.iter().find(|c| c.claims(&value, target)) {
            Some(c) => c
                .convert(value, target)
                .map_err(|e| e.with_context(format!("converter {}", c.name()))),
            None => Ok(value),
        }
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        ConverterRegistry::empty()
            .with(MsDateConverter)
            .with(IsoTemporalConverter)
            .with(TimeZoneConverter)
            .with(IsoDurationConverter)
            .with(EnumNameConverter)
    }
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn is_temporal(target: &TargetKind) -> bool {
    matches!(
        target,
        TargetKind::Date | TargetKind::LocalDateTime | TargetKind::DateTime
    )
}

fn utc() -> FixedOffset {
    chrono::Utc.fix()
}

/// Reshape a timestamp into the variant `target` asks for.
fn temporal_for(dt: DateTime<FixedOffset>, target: &TargetKind) -> Value {
    match target {
        TargetKind::Date => Value::Date(dt.date_naive()),
        TargetKind::LocalDateTime => Value::LocalDateTime(dt.naive_local()),
        _ => Value::DateTime(dt),
    }
}

// ---------------------------------------------------------------------------
// "/Date(ms+hhmm)/"
// ---------------------------------------------------------------------------

/// Legacy JSON dates: `"/Date(1262304000000)/"` or `"/Date(1262304000000+0100)/"`.
///
/// The millisecond count is UTC; the optional suffix is the offset to present
/// the instant in.
pub struct MsDateConverter;

impl MsDateConverter {
    fn parse(text: &str) -> Option<DateTime<FixedOffset>> {
        let inner = text.strip_prefix("/Date(")?.strip_suffix(")/")?;
        let split = inner
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '+' || *c == '-')
            .map(|(i, _)| i);
        let (millis, offset) = match split {
            Some(i) => (&inner[..i], Some(&inner[i..])),
            None => (inner, None),
        };
        let millis: i64 = millis.parse().ok()?;
        let offset = match offset {
            Some(o) => parse_offset(o)?,
            None => utc(),
        };
        let instant = chrono::Utc.timestamp_millis_opt(millis).single()?;
        Some(instant.with_timezone(&offset))
    }
}

impl ValueConverter for MsDateConverter {
    fn name(&self) -> &'static str {
        "ms-date"
    }

    fn claims(&self, value: &Value, target: &TargetKind) -> bool {
        is_temporal(target) && value.as_str().is_some_and(|s| s.starts_with("/Date("))
    }

    fn convert(&self, value: Value, target: &TargetKind) -> Result<Value, CyflowError> {
        let text = value.as_str().unwrap_or_default();
        let dt = Self::parse(text)
            .ok_or_else(|| CyflowError::Mapping(format!("'{text}' is not a /Date(...)/ value")))?;
        Ok(temporal_for(dt, target))
    }
}

// ---------------------------------------------------------------------------
// ISO-8601 text
// ---------------------------------------------------------------------------

/// ISO-8601 text for dates, times, and timestamps, and epoch milliseconds for
/// timestamps.
pub struct IsoTemporalConverter;

impl IsoTemporalConverter {
    fn parse(text: &str, target: &TargetKind) -> Option<Value> {
        match target {
            TargetKind::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(Value::Date)
                .or_else(|| Self::parse_datetime(text).map(|dt| temporal_for(dt, target))),
            TargetKind::LocalDateTime => NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(Value::LocalDateTime)
                .or_else(|| Self::parse_datetime(text).map(|dt| temporal_for(dt, target))),
            TargetKind::DateTime => Self::parse_datetime(text).map(Value::DateTime),
            TargetKind::LocalTime => NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
                .ok()
                .map(Value::LocalTime),
            TargetKind::Time => {
                let split = text.rfind(['+', '-', 'Z'])?;
                let time = NaiveTime::parse_from_str(&text[..split], "%H:%M:%S%.f").ok()?;
                let offset = parse_offset(&text[split..])?;
                Some(Value::Time(time, offset))
            }
            _ => None,
        }
    }

    fn parse_datetime(text: &str) -> Option<DateTime<FixedOffset>> {
        // Cypher appends a zone id in brackets: 2024-01-01T10:00:00+01:00[Europe/Paris]
        let text = text.split('[').next().unwrap_or(text);
        DateTime::parse_from_rfc3339(text).ok()
    }
}

impl ValueConverter for IsoTemporalConverter {
    fn name(&self) -> &'static str {
        "iso-temporal"
    }

    fn claims(&self, value: &Value, target: &TargetKind) -> bool {
        match (value, target) {
            (Value::Integer(_), TargetKind::DateTime) => true,
            (Value::String(s), t) => Self::parse(s, t).is_some(),
            _ => false,
        }
    }

    fn convert(&self, value: Value, target: &TargetKind) -> Result<Value, CyflowError> {
        match value {
            Value::Integer(ms) => chrono::Utc
                .timestamp_millis_opt(ms)
                .single()
                .map(|dt| Value::DateTime(dt.with_timezone(&utc())))
                .ok_or_else(|| CyflowError::Mapping(format!("{ms} is out of range for a timestamp"))),
            Value::String(s) => Self::parse(&s, target)
                .ok_or_else(|| CyflowError::Mapping(format!("'{s}' is not ISO-8601"))),
            other => Ok(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Time zones
// ---------------------------------------------------------------------------

/// Parse `Z`, `UTC`, `+05:30`, `+0530`, or `-08`.
pub fn parse_offset(text: &str) -> Option<FixedOffset> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
        return Some(utc());
    }
    let (sign, rest) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Offset strings into whole seconds east of UTC.
pub struct TimeZoneConverter;

impl ValueConverter for TimeZoneConverter {
    fn name(&self) -> &'static str {
        "time-zone"
    }

    fn claims(&self, value: &Value, target: &TargetKind) -> bool {
        *target == TargetKind::TimeZone && value.as_str().is_some()
    }

    fn convert(&self, value: Value, _target: &TargetKind) -> Result<Value, CyflowError> {
        let text = value.as_str().unwrap_or_default();
        parse_offset(text)
            .map(|o| Value::Integer(o.local_minus_utc() as i64))
            .ok_or_else(|| CyflowError::Mapping(format!("'{text}' is not a UTC offset")))
    }
}

// ---------------------------------------------------------------------------
// Durations
// ---------------------------------------------------------------------------

/// ISO-8601 durations (`P1DT2H30M`, `PT0.5S`). Months and years are rejected
/// since they have no fixed length.
pub struct IsoDurationConverter;

impl IsoDurationConverter {
    fn parse(text: &str) -> Option<std::time::Duration> {
        let body = text.strip_prefix('P')?;
        let (date_part, time_part) = match body.split_once('T') {
            Some((d, t)) => (d, Some(t)),
            None => (body, None),
        };
        let mut secs = 0f64;
        let mut number = String::new();
        for c in date_part.chars() {
            match c {
                '0'..='9' | '.' => number.push(c),
                'W' => secs += number.parse::<f64>().ok()? * 7.0 * 86_400.0,
                'D' => secs += number.parse::<f64>().ok()? * 86_400.0,
                _ => return None,
            }
            if c.is_ascii_alphabetic() {
                number.clear();
            }
        }
        for c in time_part.unwrap_or_default().chars() {
            match c {
                '0'..='9' | '.' => number.push(c),
                'H' => secs += number.parse::<f64>().ok()? * 3_600.0,
                'M' => secs += number.parse::<f64>().ok()? * 60.0,
                'S' => secs += number.parse::<f64>().ok()?,
                _ => return None,
            }
            if c.is_ascii_alphabetic() {
                number.clear();
            }
        }
        if !number.is_empty() {
            return None;
        }
        std::time::Duration::try_from_secs_f64(secs).ok()
    }
}

impl ValueConverter for IsoDurationConverter {
    fn name(&self) -> &'static str {
        "iso-duration"
    }

    fn claims(&self, value: &Value, target: &TargetKind) -> bool {
        *target == TargetKind::Duration && value.as_str().is_some_and(|s| s.starts_with('P'))
    }

    fn convert(&self, value: Value, _target: &TargetKind) -> Result<Value, CyflowError> {
        let text = value.as_str().unwrap_or_default();
        Self::parse(text)
            .map(Value::Duration)
            .ok_or_else(|| CyflowError::Mapping(format!("'{text}' is not a day-time ISO-8601 duration")))
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Enum cells stored by name with different casing, or by ordinal.
///
/// Rewrites the cell to the canonical variant name.
pub struct EnumNameConverter;

impl ValueConverter for EnumNameConverter {
    fn name(&self) -> &'static str {
        "enum-name"
    }

    fn claims(&self, value: &Value, target: &TargetKind) -> bool {
        matches!(
            (value, target),
            (Value::String(_) | Value::Integer(_), TargetKind::Enum { .. })
        )
    }

    fn convert(&self, value: Value, target: &TargetKind) -> Result<Value, CyflowError> {
        let TargetKind::Enum { name, variants } = target else {
            return Ok(value);
        };
        let found = match &value {
            Value::String(s) => variants.iter().find(|v| v.eq_ignore_ascii_case(s.trim())),
            Value::Integer(i) => usize::try_from(*i).ok().and_then(|i| variants.get(i)),
            _ => None,
        };
        match found {
            Some(v) => Ok(Value::String((*v).to_owned())),
            None => Err(CyflowError::Mapping(format!(
                "{value:?} is not a variant of {name} (expected one of {variants:?})"
            ))),
        }
    }
}

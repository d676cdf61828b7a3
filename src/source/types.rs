//! Source entity model
//!
//! Closed value types for graph node properties. Every variant has a total
//! conversion to a JSON scalar, so nothing outside this set can reach
//! serialization.

use crate::error::{Error, Result};
use crate::types::JsonValue;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};

/// One graph node read from the source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntity {
    /// Stable identifier, unique within the source
    pub element_id: String,
    /// Labels in source order
    pub labels: Vec<String>,
    /// Properties in source order
    pub properties: Vec<(String, PropertyValue)>,
}

impl SourceEntity {
    /// Create an entity with no properties
    pub fn new(element_id: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            element_id: element_id.into(),
            labels,
            properties: Vec::new(),
        }
    }

    /// Append a property
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.push((key.into(), value));
        self
    }
}

/// A node property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Temporal(Temporal),
    /// Homogeneous array property
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Convert to the JSON value written to the warehouse
    pub fn to_json(&self) -> JsonValue {
        match self {
            PropertyValue::String(s) => JsonValue::String(s.clone()),
            PropertyValue::Integer(i) => JsonValue::from(*i),
            PropertyValue::Float(f) => float_to_json(*f),
            PropertyValue::Boolean(b) => JsonValue::Bool(*b),
            PropertyValue::Temporal(t) => JsonValue::String(t.to_iso()),
            PropertyValue::List(items) => {
                JsonValue::Array(items.iter().map(PropertyValue::to_json).collect())
            }
        }
    }
}

// JSON has no representation for NaN or infinities
fn float_to_json(value: f64) -> JsonValue {
    match serde_json::Number::from_f64(value) {
        Some(n) => JsonValue::Number(n),
        None if value.is_nan() => JsonValue::String("NaN".to_string()),
        None if value.is_sign_positive() => JsonValue::String("Infinity".to_string()),
        None => JsonValue::String("-Infinity".to_string()),
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<Temporal> for PropertyValue {
    fn from(value: Temporal) -> Self {
        PropertyValue::Temporal(value)
    }
}

/// Temporal property value
#[derive(Debug, Clone, PartialEq)]
pub enum Temporal {
    Date(NaiveDate),
    /// Time of day with a UTC offset
    Time {
        time: NaiveTime,
        offset: FixedOffset,
    },
    LocalTime(NaiveTime),
    DateTime(DateTime<FixedOffset>),
    LocalDateTime(NaiveDateTime),
    /// ISO-8601 duration text (e.g. `P14DT16H12M`), kept verbatim
    Duration(String),
}

impl Temporal {
    /// Parse the textual form the Query API uses for the given type name
    pub fn parse(type_name: &str, text: &str) -> Result<Self> {
        let malformed =
            |e: &dyn std::fmt::Display| Error::malformed(format!("invalid {type_name} '{text}': {e}"));

        match type_name {
            "Date" => text
                .parse::<NaiveDate>()
                .map(Temporal::Date)
                .map_err(|e| malformed(&e)),
            "LocalTime" => text
                .parse::<NaiveTime>()
                .map(Temporal::LocalTime)
                .map_err(|e| malformed(&e)),
            "Time" => {
                let (time, offset) = split_offset(text).ok_or_else(|| malformed(&"missing offset"))?;
                let time = time.parse::<NaiveTime>().map_err(|e| malformed(&e))?;
                let offset = parse_offset(offset).ok_or_else(|| malformed(&"bad offset"))?;
                Ok(Temporal::Time { time, offset })
            }
            "DateTime" | "OffsetDateTime" | "ZonedDateTime" => {
                // Zoned values carry a trailing region id, e.g. `[Europe/London]`
                let instant = text.split('[').next().unwrap_or(text);
                instant
                    .parse::<DateTime<FixedOffset>>()
                    .map(Temporal::DateTime)
                    .map_err(|e| malformed(&e))
            }
            "LocalDateTime" => text
                .parse::<NaiveDateTime>()
                .map(Temporal::LocalDateTime)
                .map_err(|e| malformed(&e)),
            "Duration" => {
                if text.starts_with('P') {
                    Ok(Temporal::Duration(text.to_string()))
                } else {
                    Err(malformed(&"expected ISO-8601 duration"))
                }
            }
            other => Err(Error::malformed(format!("unknown temporal type '{other}'"))),
        }
    }

    /// Canonical ISO-8601 text
    pub fn to_iso(&self) -> String {
        match self {
            Temporal::Date(d) => d.format("%Y-%m-%d").to_string(),
            Temporal::Time { time, offset } => {
                format!("{}{offset}", time.format("%H:%M:%S%.f"))
            }
            Temporal::LocalTime(t) => t.format("%H:%M:%S%.f").to_string(),
            Temporal::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            Temporal::LocalDateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Temporal::Duration(d) => d.clone(),
        }
    }
}

/// Split `12:50:35.556+01:00` into time and offset parts
fn split_offset(text: &str) -> Option<(&str, &str)> {
    if let Some(time) = text.strip_suffix('Z') {
        return Some((time, "Z"));
    }
    let idx = text.rfind(['+', '-'])?;
    Some((&text[..idx], &text[idx..]))
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    if text == "Z" {
        return FixedOffset::east_opt(0);
    }
    text.parse::<FixedOffset>().ok()
}

/// Source collaborator: an ordered range query service over graph nodes
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Return up to `limit` entities after skipping `skip`, in a stable order
    async fn fetch_range(&self, skip: u64, limit: u64) -> Result<Vec<SourceEntity>>;

    /// Verify the source is reachable and the credentials are accepted
    async fn verify(&self) -> Result<()>;

    /// Short description for logs
    fn describe(&self) -> String {
        "graph source".to_string()
    }
}

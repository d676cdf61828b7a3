//! Typed JSON decoding for Neo4j Query API responses
//!
//! With `Accept: application/vnd.neo4j.query` every value is wrapped as
//! `{"$type": "...", "_value": ...}`. Integers and floats arrive as strings.

use super::types::{PropertyValue, SourceEntity, Temporal};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use serde::Deserialize;

/// Body of a Query API response
#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub data: Option<QueryData>,
    #[serde(default)]
    pub errors: Vec<QueryError>,
}

/// Result table of a query
#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueryData {
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<JsonValue>>,
}

/// Error entry reported by the server
#[derive(Debug, Deserialize)]
pub(crate) struct QueryError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl From<&QueryError> for Error {
    fn from(err: &QueryError) -> Self {
        Error::source(err.code.clone(), err.message.clone())
    }
}

impl QueryData {
    /// Decode every row's `column` as a node
    pub fn nodes(&self, column: &str) -> Result<Vec<SourceEntity>> {
        let idx = self
            .fields
            .iter()
            .position(|f| f == column)
            .ok_or_else(|| Error::malformed(format!("column '{column}' missing from result")))?;

        self.values
            .iter()
            .map(|row| {
                row.get(idx)
                    .ok_or_else(|| Error::malformed(format!("row has no column {idx}")))
                    .and_then(decode_node)
            })
            .collect()
    }
}

fn unwrap_typed(value: &JsonValue) -> Result<(&str, &JsonValue)> {
    let type_name = value
        .get("$type")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::malformed(format!("value without $type: {value}")))?;
    let inner = value.get("_value").unwrap_or(&JsonValue::Null);
    Ok((type_name, inner))
}

/// Decode a typed `Node` value into an entity
pub(crate) fn decode_node(value: &JsonValue) -> Result<SourceEntity> {
    let (type_name, node) = unwrap_typed(value)?;
    if type_name != "Node" {
        return Err(Error::malformed(format!(
            "expected Node, got {type_name}"
        )));
    }

    let element_id = node
        .get("_element_id")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| Error::malformed("node without _element_id"))?
        .to_string();

    let labels = node
        .get("_labels")
        .and_then(JsonValue::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(JsonValue::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let mut properties = Vec::new();
    if let Some(props) = node.get("_properties").and_then(JsonValue::as_object) {
        for (key, raw) in props {
            let value = decode_property(raw).map_err(|e| match e {
                Error::MalformedData { message } => {
                    Error::malformed(format!("node {element_id}, property '{key}': {message}"))
                }
                other => other,
            })?;
            properties.push((key.clone(), value));
        }
    }

    Ok(SourceEntity {
        element_id,
        labels,
        properties,
    })
}

/// Decode one typed property value
pub(crate) fn decode_property(value: &JsonValue) -> Result<PropertyValue> {
    let (type_name, inner) = unwrap_typed(value)?;

    match type_name {
        "String" => inner
            .as_str()
            .map(|s| PropertyValue::String(s.to_string()))
            .ok_or_else(|| Error::malformed("String without text")),
        "Integer" => parse_number::<i64>(inner).map(PropertyValue::Integer),
        "Float" => parse_number::<f64>(inner).map(PropertyValue::Float),
        "Boolean" => inner
            .as_bool()
            .map(PropertyValue::Boolean)
            .ok_or_else(|| Error::malformed("Boolean without value")),
        "List" => inner
            .as_array()
            .ok_or_else(|| Error::malformed("List without items"))?
            .iter()
            .map(decode_property)
            .collect::<Result<Vec<_>>>()
            .map(PropertyValue::List),
        "Date" | "Time" | "LocalTime" | "DateTime" | "OffsetDateTime" | "ZonedDateTime"
        | "LocalDateTime" | "Duration" => {
            let text = inner
                .as_str()
                .ok_or_else(|| Error::malformed(format!("{type_name} without text")))?;
            Temporal::parse(type_name, text).map(PropertyValue::Temporal)
        }
        other => Err(Error::malformed(format!(
            "unsupported property type '{other}'"
        ))),
    }
}

// The Query API sends numbers as strings to avoid precision loss
fn parse_number<T: std::str::FromStr>(value: &JsonValue) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let text = match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        other => return Err(Error::malformed(format!("not a number: {other}"))),
    };
    text.parse::<T>()
        .map_err(|e| Error::malformed(format!("invalid number '{text}': {e}")))
}

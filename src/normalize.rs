//! Record normalization
//!
//! Flattens a [`SourceEntity`] into the JSON object loaded into the warehouse:
//! `element_id` and `labels` first, then every property under its own key in
//! source order.

use crate::error::Result;
use crate::source::SourceEntity;
use crate::types::{JsonObject, JsonValue};
use serde::Serialize;

/// Reserved key holding the node's element id
pub const ELEMENT_ID_KEY: &str = "element_id";

/// Reserved key holding the node's labels
pub const LABELS_KEY: &str = "labels";

/// A flat, warehouse-ingestible record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedRecord(JsonObject);

impl NormalizedRecord {
    /// The node's element id
    pub fn element_id(&self) -> Option<&str> {
        self.0.get(ELEMENT_ID_KEY).and_then(JsonValue::as_str)
    }

    /// Borrow the underlying object
    pub fn as_object(&self) -> &JsonObject {
        &self.0
    }

    /// Take the underlying object
    pub fn into_inner(self) -> JsonObject {
        self.0
    }

    /// Serialize as a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

/// Normalize one entity.
///
/// Reserved keys win: a property named `element_id` or `labels` is dropped.
pub fn normalize(entity: &SourceEntity) -> NormalizedRecord {
    let mut record = JsonObject::with_capacity(entity.properties.len() + 2);
    record.insert(
        ELEMENT_ID_KEY.to_string(),
        JsonValue::String(entity.element_id.clone()),
    );
    record.insert(
        LABELS_KEY.to_string(),
        JsonValue::Array(
            entity
                .labels
                .iter()
                .cloned()
                .map(JsonValue::String)
                .collect(),
        ),
    );

    for (key, value) in &entity.properties {
        if key == ELEMENT_ID_KEY || key == LABELS_KEY {
            continue;
        }
        record.insert(key.clone(), value.to_json());
    }

    NormalizedRecord(record)
}

/// Normalize a whole batch, preserving order
pub fn normalize_batch(entities: &[SourceEntity]) -> Vec<NormalizedRecord> {
    entities.iter().map(normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{PropertyValue, Temporal};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> SourceEntity {
        SourceEntity::new("4:db:12", vec!["CompanyTag".into(), "Tag".into()])
            .with_property("name", "payments".into())
            .with_property("rank", PropertyValue::Integer(3))
            .with_property(
                "since",
                Temporal::Date(NaiveDate::from_ymd_opt(2021, 6, 30).unwrap()).into(),
            )
            .with_property("verified", PropertyValue::Boolean(false))
    }

    #[test]
    fn test_normalize_shape() {
        let record = normalize(&sample());

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "element_id": "4:db:12",
                "labels": ["CompanyTag", "Tag"],
                "name": "payments",
                "rank": 3,
                "since": "2021-06-30",
                "verified": false
            })
        );
        assert_eq!(record.element_id(), Some("4:db:12"));
    }

    #[test]
    fn test_key_order_is_deterministic() {
        let record = normalize(&sample());
        let keys: Vec<_> = record.as_object().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["element_id", "labels", "name", "rank", "since", "verified"]
        );
    }

    #[test]
    fn test_normalize_is_repeatable() {
        let entity = sample();
        let first = normalize(&entity).to_json_line().unwrap();
        let second = normalize(&entity).to_json_line().unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            r#"{"element_id":"4:db:12","labels":["CompanyTag","Tag"],"name":"payments","rank":3,"since":"2021-06-30","verified":false}"#
        );
    }

    #[test]
    fn test_reserved_keys_win() {
        let entity = SourceEntity::new("4:db:1", vec!["A".into()])
            .with_property("element_id", "spoofed".into())
            .with_property("labels", "also spoofed".into())
            .with_property("kept", PropertyValue::Integer(1));

        let record = normalize(&entity);
        assert_eq!(record.element_id(), Some("4:db:1"));
        assert_eq!(record.as_object()["labels"], json!(["A"]));
        assert_eq!(record.as_object().len(), 3);
    }

    #[test]
    fn test_entity_without_labels_or_properties() {
        let record = normalize(&SourceEntity::new("4:db:9", vec![]));
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({ "element_id": "4:db:9", "labels": [] })
        );
    }

    #[test]
    fn test_normalize_batch_preserves_order() {
        let entities = vec![
            SourceEntity::new("4:db:2", vec![]),
            SourceEntity::new("4:db:1", vec![]),
        ];
        let records = normalize_batch(&entities);
        assert_eq!(records[0].element_id(), Some("4:db:2"));
        assert_eq!(records[1].element_id(), Some("4:db:1"));
    }
}

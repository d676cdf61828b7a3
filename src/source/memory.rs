//! In-memory graph source
//!
//! Serves a fixed, ordered set of entities. Stands in for a database when
//! exercising the pipeline.

use super::types::{GraphSource, PropertyValue, SourceEntity};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

/// Graph source over a vector of entities
#[derive(Debug, Default)]
pub struct InMemorySource {
    entities: Vec<SourceEntity>,
    calls: Mutex<Vec<(u64, u64)>>,
    transient_failures: AtomicU32,
}

impl InMemorySource {
    /// Serve `entities` in the given order
    pub fn new(entities: Vec<SourceEntity>) -> Self {
        Self {
            entities,
            ..Self::default()
        }
    }

    /// `count` generated nodes labelled `Synthetic`
    pub fn synthetic(count: usize) -> Self {
        let entities = (0..count)
            .map(|i| {
                SourceEntity::new(format!("4:memory:{i:08}"), vec!["Synthetic".to_string()])
                    .with_property("index", PropertyValue::Integer(i as i64))
            })
            .collect();
        Self::new(entities)
    }

    /// Make the next `count` range queries fail with a 503
    #[must_use]
    pub fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Every `(skip, limit)` requested so far, failed attempts included
    pub fn calls(&self) -> Vec<(u64, u64)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of entities served
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the source has no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[async_trait]
impl GraphSource for InMemorySource {
    async fn fetch_range(&self, skip: u64, limit: u64) -> Result<Vec<SourceEntity>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((skip, limit));

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::http_status(503, "Service Unavailable"));
        }

        Ok(self
            .entities
            .iter()
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn verify(&self) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        format!("in-memory source ({} nodes)", self.entities.len())
    }
}

//! Row-at-a-time loader

use super::BatchLoader;
use crate::config::DEFAULT_CALL_TIMEOUT;
use crate::error::Result;
use crate::normalize::NormalizedRecord;
use crate::retry::with_timeout;
use crate::types::LoadMethod;
use crate::warehouse::WarehouseClient;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Inserts each record as its own row.
///
/// Much slower than staging; useful when no stage storage is reachable.
pub struct RowInsertLoader {
    warehouse: Arc<dyn WarehouseClient>,
    table: String,
    call_timeout: Option<Duration>,
}

impl RowInsertLoader {
    pub fn new(warehouse: Arc<dyn WarehouseClient>, table: impl Into<String>) -> Self {
        Self {
            warehouse,
            table: table.into(),
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
        }
    }

    /// Bound each insert; `None` waits indefinitely
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }
}

#[async_trait]
impl BatchLoader for RowInsertLoader {
    async fn load(&self, records: &[NormalizedRecord]) -> Result<usize> {
        for record in records {
            let json = record.to_json_line()?;
            let insert = self.warehouse.insert_json_row(&self.table, &json);
            with_timeout("insert row", self.call_timeout, insert).await?;
        }

        info!(rows = records.len(), table = %self.table, "Inserted batch row by row");
        Ok(records.len())
    }

    fn method(&self) -> LoadMethod {
        LoadMethod::Rows
    }
}

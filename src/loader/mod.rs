//! Batch loader module
//!
//! Writes normalized batches into the warehouse table.
//!
//! # Load methods
//!
//! - `StagedLoader` - serialize to a transient NDJSON file, upload it to a
//!   stage with gzip, bulk copy from the stage, always delete the local file
//! - `RowInsertLoader` - one insert per record with an inline JSON cast

mod rows;
mod staged;

pub use rows::RowInsertLoader;
pub use staged::StagedLoader;

use crate::config::WarehouseSettings;
use crate::error::Result;
use crate::normalize::NormalizedRecord;
use crate::types::LoadMethod;
use crate::warehouse::WarehouseClient;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Writes one batch into the destination table
#[async_trait]
pub trait BatchLoader: Send + Sync {
    /// Load every record, returning the number of rows written.
    ///
    /// On error some prefix of the batch may have landed.
    async fn load(&self, records: &[NormalizedRecord]) -> Result<usize>;

    /// The method this loader implements
    fn method(&self) -> LoadMethod;
}

/// Build the loader for a load method, bounding each warehouse call by
/// `call_timeout`
pub fn build_loader(
    method: LoadMethod,
    warehouse: Arc<dyn WarehouseClient>,
    settings: &WarehouseSettings,
    call_timeout: Option<Duration>,
) -> Arc<dyn BatchLoader> {
    match method {
        LoadMethod::Stage => Arc::new(
            StagedLoader::new(warehouse, settings).with_call_timeout(call_timeout),
        ),
        LoadMethod::Rows => Arc::new(
            RowInsertLoader::new(warehouse, &settings.table).with_call_timeout(call_timeout),
        ),
    }
}

#[cfg(test)]
mod tests;

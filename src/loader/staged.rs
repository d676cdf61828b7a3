//! Stage-and-copy loader

use super::BatchLoader;
use crate::config::{WarehouseSettings, DEFAULT_CALL_TIMEOUT};
use crate::error::{Error, Result};
use crate::normalize::NormalizedRecord;
use crate::retry::with_timeout;
use crate::types::{FileFormat, LoadMethod, StageCompression};
use crate::warehouse::WarehouseClient;
use async_trait::async_trait;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// Prefix of every transient batch file
const TEMP_PREFIX: &str = "neo4j_batch_";

/// Loads batches through a warehouse stage
pub struct StagedLoader {
    warehouse: Arc<dyn WarehouseClient>,
    table: String,
    stage: String,
    compression: StageCompression,
    format: FileFormat,
    purge_staged: bool,
    temp_dir: Option<PathBuf>,
    call_timeout: Option<Duration>,
}

impl StagedLoader {
    /// Create a loader for the table and stage named in the settings
    pub fn new(warehouse: Arc<dyn WarehouseClient>, settings: &WarehouseSettings) -> Self {
        Self {
            warehouse,
            table: settings.table.clone(),
            stage: settings.stage.clone(),
            compression: StageCompression::default(),
            format: FileFormat::default(),
            purge_staged: settings.purge_staged,
            temp_dir: settings.temp_dir.clone(),
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
        }
    }

    /// Override the upload compression
    #[must_use]
    pub fn with_compression(mut self, compression: StageCompression) -> Self {
        self.compression = compression;
        self
    }

    /// Bound each warehouse call; `None` waits indefinitely
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Write the batch to a fresh, uniquely named NDJSON file.
    ///
    /// The returned guard deletes the file when dropped.
    fn write_batch(&self, records: &[NormalizedRecord]) -> Result<TempPath> {
        let suffix = format!(".{}", self.format.extension());
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(&suffix);
        let file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let mut writer = BufWriter::new(file);
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;

        Ok(file.into_temp_path())
    }
}

#[async_trait]
impl BatchLoader for StagedLoader {
    async fn load(&self, records: &[NormalizedRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let local = self.write_batch(records)?;
        debug!(path = %local.display(), records = records.len(), "Wrote batch file");

        // `local` is dropped (and the file removed) on every early return below
        with_timeout(
            "create stage",
            self.call_timeout,
            self.warehouse.create_stage(&self.stage),
        )
        .await?;
        let staged = with_timeout(
            "put file",
            self.call_timeout,
            self.warehouse.put_file(&local, &self.stage, self.compression),
        )
        .await?;
        let rows = with_timeout(
            "copy from stage",
            self.call_timeout,
            self.warehouse.copy_from_stage(&self.table, &staged, self.format),
        )
        .await?;

        if let Err(e) = local.close() {
            warn!(error = %e, "Failed to delete batch file");
        }

        if rows != records.len() {
            return Err(Error::LoadMismatch {
                expected: records.len(),
                loaded: rows,
            });
        }

        if self.purge_staged {
            let purge = self.warehouse.remove_staged(&staged);
            if let Err(e) = with_timeout("remove staged", self.call_timeout, purge).await {
                warn!(staged = %staged.name, error = %e, "Failed to purge staged file");
            }
        }

        info!(
            rows,
            staged = %staged.name,
            bytes = staged.size_bytes,
            table = %self.table,
            "Loaded batch from stage"
        );
        Ok(rows)
    }

    fn method(&self) -> LoadMethod {
        LoadMethod::Stage
    }
}

impl std::fmt::Debug for StagedLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedLoader")
            .field("warehouse", &self.warehouse.describe())
            .field("table", &self.table)
            .field("stage", &self.stage)
            .field("compression", &self.compression)
            .field("purge_staged", &self.purge_staged)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

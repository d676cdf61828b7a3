//! Warehouse collaborator types

use crate::config::WarehouseSettings;
use crate::error::Result;
use crate::types::{FileFormat, StageCompression};
use async_trait::async_trait;
use std::path::Path;

/// Session context selected before any load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseContext {
    /// Compute resource (virtual warehouse / cluster), if the backend has one
    pub compute: Option<String>,
    /// Database
    pub database: String,
    /// Schema
    pub schema: String,
}

impl WarehouseContext {
    /// Context named by the warehouse settings
    pub fn from_settings(settings: &WarehouseSettings) -> Self {
        Self {
            compute: settings.compute.clone(),
            database: settings.database.clone(),
            schema: settings.schema.clone(),
        }
    }
}

/// An artifact uploaded into a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// Stage the artifact lives in
    pub stage: String,
    /// Artifact name within the stage, compression suffix included
    pub name: String,
    /// Uploaded size in bytes
    pub size_bytes: u64,
}

/// Write side of replication.
///
/// Mirrors the session a bulk loader needs: select a context, make sure the
/// stage and table exist, upload a local file, copy it into the table.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Select compute, database and schema for the session
    async fn use_context(&self, context: &WarehouseContext) -> Result<()>;

    /// Create the destination table (single JSON column) if missing
    async fn ensure_table(&self, table: &str) -> Result<()>;

    /// Create the named stage if missing
    async fn create_stage(&self, stage: &str) -> Result<()>;

    /// Upload a local file into a stage
    async fn put_file(
        &self,
        local: &Path,
        stage: &str,
        compression: StageCompression,
    ) -> Result<StagedFile>;

    /// Bulk copy a staged artifact into a table, returning rows loaded
    async fn copy_from_stage(
        &self,
        table: &str,
        file: &StagedFile,
        format: FileFormat,
    ) -> Result<usize>;

    /// Insert one JSON document as a row
    async fn insert_json_row(&self, table: &str, json: &str) -> Result<()>;

    /// Delete a staged artifact
    async fn remove_staged(&self, file: &StagedFile) -> Result<()>;

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

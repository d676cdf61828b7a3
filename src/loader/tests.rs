//! Tests for the loader module

use super::*;
use crate::config::DEFAULT_CALL_TIMEOUT;
use crate::error::Error;
use crate::normalize::normalize_batch;
use crate::source::{PropertyValue, SourceEntity};
use crate::types::{FileFormat, StageCompression};
use crate::warehouse::{StagedFile, WarehouseContext};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;

/// Warehouse double recording every call
#[derive(Default)]
struct RecordingWarehouse {
    calls: Mutex<Vec<String>>,
    local_files: Mutex<Vec<PathBuf>>,
    uploads: Mutex<Vec<String>>,
    rows: Mutex<Vec<String>>,
    fail_on: Option<&'static str>,
    stall_on: Option<&'static str>,
    copied_rows: Option<usize>,
}

impl RecordingWarehouse {
    fn failing_on(step: &'static str) -> Self {
        Self {
            fail_on: Some(step),
            ..Self::default()
        }
    }

    fn stalling_on(step: &'static str) -> Self {
        Self {
            stall_on: Some(step),
            ..Self::default()
        }
    }

    /// Never return from `step`, like a warehouse that stopped answering
    async fn stall(&self, step: &str) {
        if self.stall_on == Some(step) {
            std::future::pending::<()>().await;
        }
    }

    fn record(&self, call: String) -> crate::error::Result<()> {
        let step = call.split(' ').next().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(call);
        if self.fail_on == Some(step.as_str()) {
            return Err(Error::warehouse(format!("{step} refused")));
        }
        Ok(())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn local_files(&self) -> Vec<PathBuf> {
        self.local_files.lock().unwrap().clone()
    }
}

#[async_trait]
impl WarehouseClient for RecordingWarehouse {
    async fn use_context(&self, context: &WarehouseContext) -> crate::error::Result<()> {
        self.record(format!("use_context {}", context.schema))
    }

    async fn ensure_table(&self, table: &str) -> crate::error::Result<()> {
        self.record(format!("ensure_table {table}"))
    }

    async fn create_stage(&self, stage: &str) -> crate::error::Result<()> {
        self.record(format!("create_stage {stage}"))
    }

    async fn put_file(
        &self,
        local: &Path,
        stage: &str,
        compression: StageCompression,
    ) -> crate::error::Result<StagedFile> {
        assert!(local.exists(), "batch file must exist during upload");
        self.local_files.lock().unwrap().push(local.to_path_buf());
        self.uploads
            .lock()
            .unwrap()
            .push(std::fs::read_to_string(local).unwrap());
        self.stall("put_file").await;

        self.record(format!("put_file {stage}"))?;
        let name = format!(
            "{}{}",
            local.file_name().unwrap().to_string_lossy(),
            compression.suffix()
        );
        Ok(StagedFile {
            stage: stage.to_string(),
            name,
            size_bytes: 64,
        })
    }

    async fn copy_from_stage(
        &self,
        table: &str,
        file: &StagedFile,
        format: FileFormat,
    ) -> crate::error::Result<usize> {
        assert_eq!(format, FileFormat::NdJson);
        self.record(format!("copy_from_stage {table} {}", file.name))?;
        let uploaded = self.uploads.lock().unwrap().last().cloned().unwrap();
        Ok(self.copied_rows.unwrap_or_else(|| uploaded.lines().count()))
    }

    async fn insert_json_row(&self, table: &str, json: &str) -> crate::error::Result<()> {
        self.stall("insert_json_row").await;
        self.record(format!("insert_json_row {table}"))?;
        self.rows.lock().unwrap().push(json.to_string());
        Ok(())
    }

    async fn remove_staged(&self, file: &StagedFile) -> crate::error::Result<()> {
        self.record(format!("remove_staged {}", file.name))
    }

    fn describe(&self) -> String {
        "recording warehouse".to_string()
    }
}

fn records(count: usize) -> Vec<NormalizedRecord> {
    let entities: Vec<_> = (0..count)
        .map(|i| {
            SourceEntity::new(format!("4:t:{i}"), vec!["Tag".to_string()])
                .with_property("index", PropertyValue::Integer(i as i64))
        })
        .collect();
    normalize_batch(&entities)
}

fn loader_over(warehouse: &Arc<RecordingWarehouse>, settings: &WarehouseSettings) -> StagedLoader {
    StagedLoader::new(warehouse.clone(), settings)
}

// ============================================================================
// Staged Loader
// ============================================================================

#[tokio::test]
async fn test_staged_protocol_order() {
    let warehouse = Arc::new(RecordingWarehouse::default());
    let loader = loader_over(&warehouse, &WarehouseSettings::default());

    let rows = loader.load(&records(3)).await.unwrap();
    assert_eq!(rows, 3);

    let calls = warehouse.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], "create_stage json_stage");
    assert_eq!(calls[1], "put_file json_stage");
    assert!(calls[2].starts_with("copy_from_stage neo4j_nodes neo4j_batch_"));
    assert!(calls[2].ends_with(".json.gz"));
}

#[tokio::test]
async fn test_staged_file_is_ndjson() {
    let warehouse = Arc::new(RecordingWarehouse::default());
    let loader = loader_over(&warehouse, &WarehouseSettings::default());
    let batch = records(2);

    loader.load(&batch).await.unwrap();

    let uploaded = warehouse.uploads.lock().unwrap()[0].clone();
    let lines: Vec<_> = uploaded.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(uploaded.ends_with('\n'));
    for (line, record) in lines.iter().zip(&batch) {
        assert_eq!(*line, record.to_json_line().unwrap());
    }
}

#[tokio::test]
async fn test_batch_file_removed_after_success() {
    let warehouse = Arc::new(RecordingWarehouse::default());
    let loader = loader_over(&warehouse, &WarehouseSettings::default());

    loader.load(&records(5)).await.unwrap();

    let files = warehouse.local_files();
    assert_eq!(files.len(), 1);
    assert!(!files[0].exists());
}

#[tokio::test]
async fn test_batch_file_removed_when_upload_fails() {
    let warehouse = Arc::new(RecordingWarehouse::failing_on("put_file"));
    let loader = loader_over(&warehouse, &WarehouseSettings::default());

    let err = loader.load(&records(5)).await.unwrap_err();
    assert!(matches!(err, Error::WarehouseOperation { .. }));

    let files = warehouse.local_files();
    assert_eq!(files.len(), 1);
    assert!(!files[0].exists());
}

#[tokio::test]
async fn test_batch_file_removed_when_copy_fails() {
    let warehouse = Arc::new(RecordingWarehouse::failing_on("copy_from_stage"));
    let loader = loader_over(&warehouse, &WarehouseSettings::default());

    assert!(loader.load(&records(5)).await.is_err());
    assert!(!warehouse.local_files()[0].exists());
}

#[tokio::test]
async fn test_batch_file_removed_when_stage_creation_fails() {
    let dir = tempdir().unwrap();
    let settings = WarehouseSettings {
        temp_dir: Some(dir.path().to_path_buf()),
        ..WarehouseSettings::default()
    };
    let warehouse = Arc::new(RecordingWarehouse::failing_on("create_stage"));
    let loader = loader_over(&warehouse, &settings);

    assert!(loader.load(&records(5)).await.is_err());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_temp_files_are_unique_and_in_temp_dir() {
    let dir = tempdir().unwrap();
    let settings = WarehouseSettings {
        temp_dir: Some(dir.path().to_path_buf()),
        ..WarehouseSettings::default()
    };
    let warehouse = Arc::new(RecordingWarehouse::default());
    let loader = loader_over(&warehouse, &settings);

    loader.load(&records(1)).await.unwrap();
    loader.load(&records(1)).await.unwrap();

    let files = warehouse.local_files();
    assert_ne!(files[0], files[1]);
    for file in &files {
        assert_eq!(file.parent().unwrap(), dir.path());
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_row_count_mismatch() {
    let warehouse = Arc::new(RecordingWarehouse {
        copied_rows: Some(2),
        ..RecordingWarehouse::default()
    });
    let loader = loader_over(&warehouse, &WarehouseSettings::default());

    let err = loader.load(&records(3)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::LoadMismatch {
            expected: 3,
            loaded: 2
        }
    ));
    assert!(!warehouse.local_files()[0].exists());
}

#[tokio::test]
async fn test_purge_staged() {
    let warehouse = Arc::new(RecordingWarehouse::default());
    let settings = WarehouseSettings {
        purge_staged: true,
        ..WarehouseSettings::default()
    };
    let loader = loader_over(&warehouse, &settings);

    loader.load(&records(1)).await.unwrap();

    let calls = warehouse.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls[3].starts_with("remove_staged neo4j_batch_"));
}

#[tokio::test]
async fn test_purge_failure_does_not_fail_load() {
    let warehouse = Arc::new(RecordingWarehouse::failing_on("remove_staged"));
    let settings = WarehouseSettings {
        purge_staged: true,
        ..WarehouseSettings::default()
    };
    let loader = loader_over(&warehouse, &settings);

    assert_eq!(loader.load(&records(2)).await.unwrap(), 2);
}

#[tokio::test]
async fn test_uncompressed_upload() {
    let warehouse = Arc::new(RecordingWarehouse::default());
    let loader = loader_over(&warehouse, &WarehouseSettings::default())
        .with_compression(StageCompression::None);

    loader.load(&records(1)).await.unwrap();
    assert!(warehouse.calls()[2].ends_with(".json"));
}

#[tokio::test]
async fn test_empty_batch_is_noop() {
    let warehouse = Arc::new(RecordingWarehouse::default());
    let loader = loader_over(&warehouse, &WarehouseSettings::default());

    assert_eq!(loader.load(&[]).await.unwrap(), 0);
    assert!(warehouse.calls().is_empty());
}

// ============================================================================
// Row Insert Loader
// ============================================================================

#[tokio::test]
async fn test_row_insert_loader() {
    let warehouse = Arc::new(RecordingWarehouse::default());
    let loader = RowInsertLoader::new(warehouse.clone(), "neo4j_nodes");
    let batch = records(3);

    assert_eq!(loader.load(&batch).await.unwrap(), 3);
    assert_eq!(loader.method(), LoadMethod::Rows);

    let rows = warehouse.rows.lock().unwrap().clone();
    let expected: Vec<_> = batch.iter().map(|r| r.to_json_line().unwrap()).collect();
    assert_eq!(rows, expected);
    assert!(warehouse.local_files().is_empty());
}

#[tokio::test]
async fn test_row_insert_failure_propagates() {
    let warehouse = Arc::new(RecordingWarehouse::failing_on("insert_json_row"));
    let loader = RowInsertLoader::new(warehouse.clone(), "neo4j_nodes");

    assert!(loader.load(&records(3)).await.is_err());
    assert_eq!(warehouse.calls().len(), 1);
}

#[test]
fn test_build_loader() {
    let warehouse: Arc<dyn WarehouseClient> = Arc::new(RecordingWarehouse::default());
    let settings = WarehouseSettings::default();
    let timeout = Some(Duration::from_secs(30));

    let loader = build_loader(LoadMethod::Stage, warehouse.clone(), &settings, timeout);
    assert_eq!(loader.method(), LoadMethod::Stage);

    let loader = build_loader(LoadMethod::Rows, warehouse, &settings, timeout);
    assert_eq!(loader.method(), LoadMethod::Rows);
}

// ============================================================================
// Call Timeouts
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stalled_upload_times_out() {
    let warehouse = Arc::new(RecordingWarehouse::stalling_on("put_file"));
    let loader = loader_over(&warehouse, &WarehouseSettings::default());

    let started = tokio::time::Instant::now();
    let err = loader.load(&records(3)).await.unwrap_err();

    assert!(
        matches!(err, Error::Timeout { ref operation, timeout_ms: 300_000 } if operation == "put file"),
        "unexpected error: {err:?}"
    );
    assert_eq!(started.elapsed(), DEFAULT_CALL_TIMEOUT);
    assert_eq!(warehouse.calls(), vec!["create_stage json_stage"]);
    assert_eq!(warehouse.local_files().len(), 1);
    for file in warehouse.local_files() {
        assert!(!file.exists(), "{} survived a timed out load", file.display());
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_insert_times_out() {
    let warehouse = Arc::new(RecordingWarehouse::stalling_on("insert_json_row"));
    let loader = RowInsertLoader::new(warehouse.clone(), "neo4j_nodes")
        .with_call_timeout(Some(Duration::from_secs(10)));

    let err = loader.load(&records(2)).await.unwrap_err();

    assert!(matches!(err, Error::Timeout { timeout_ms: 10_000, .. }));
    assert!(err.is_transient());
    assert!(warehouse.calls().is_empty());
}

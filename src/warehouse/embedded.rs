//! DuckDB-backed warehouse
//!
//! The warehouse database file is attached under the configured database
//! alias. Stages are folders in a [`StageArea`]; copies read the staged
//! NDJSON straight from there with `read_json_objects`, so the same code
//! path serves local directories and cloud buckets.
//!
//! DuckDB calls block, so every trait method runs them on the blocking pool.
//! A caller's timeout then bounds the wait even while a statement is running.

use super::stage::{gzip, StageArea};
use super::types::{StagedFile, WarehouseClient, WarehouseContext};
use crate::config::{is_identifier, WarehouseSettings};
use crate::error::{Error, Result};
use crate::types::{FileFormat, JsonValue, StageCompression};
use async_trait::async_trait;
use bytes::Bytes;
use duckdb::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Warehouse client over an embedded DuckDB database
pub struct DuckDbWarehouse {
    conn: Arc<Mutex<Connection>>,
    path: String,
    stage: StageArea,
}

impl DuckDbWarehouse {
    /// Open the warehouse named by the settings
    pub fn connect(settings: &WarehouseSettings) -> Result<Self> {
        let path = settings.path()?.to_string();
        let stage = StageArea::parse(&settings.stage_url)?;
        Self::open(&path, &settings.database, stage)
    }

    /// Open a database file under `alias`, staging through `stage`
    pub fn open(path: &str, alias: &str, stage: StageArea) -> Result<Self> {
        let alias = quote_ident(alias)?;
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::config(format!("Failed to create DuckDB connection: {e}")))?;

        conn.execute_batch(&format!("ATTACH '{}' AS {alias};", escape_literal(path)))
            .map_err(|e| Error::warehouse(format!("Failed to attach {path}: {e}")))?;

        let warehouse = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_string(),
            stage,
        };
        if warehouse.stage.is_cloud() {
            warehouse.configure_cloud_storage()?;
        }

        info!(path, stage = %warehouse.stage.scheme(), "Opened DuckDB warehouse");
        Ok(warehouse)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        lock(&self.conn)
    }

    /// Run DuckDB work on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            f(&guard)
        })
        .await
        .map_err(|e| Error::warehouse(format!("DuckDB task failed: {e}")))?
    }

    /// Configure cloud storage credentials (S3, R2, GCS, Azure)
    fn configure_cloud_storage(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch("INSTALL httpfs; LOAD httpfs;")
            .map_err(|e| Error::config(format!("Failed to load httpfs extension: {e}")))?;

        for (target, sql) in cloud_storage_statements(|name| std::env::var(name).ok()) {
            conn.execute_batch(&sql)
                .map_err(|e| Error::config(format!("Failed to configure {target}: {e}")))?;
        }
        Ok(())
    }

    /// Number of rows in a table of the current schema
    pub fn row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table)?);
        let count: i64 = self.conn()?.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Every document in a table, in insertion order
    pub fn documents(&self, table: &str) -> Result<Vec<JsonValue>> {
        let sql = format!(
            "SELECT CAST(data AS VARCHAR) FROM {} ORDER BY rowid",
            quote_ident(table)?
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(serde_json::from_str(&row?)?);
        }
        Ok(documents)
    }

    /// The stage storage root
    pub fn stage_area(&self) -> &StageArea {
        &self.stage
    }
}

impl std::fmt::Debug for DuckDbWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbWarehouse")
            .field("path", &self.path)
            .field("stage", &self.stage.scheme())
            .finish()
    }
}

#[async_trait]
impl WarehouseClient for DuckDbWarehouse {
    async fn use_context(&self, context: &WarehouseContext) -> Result<()> {
        if let Some(compute) = &context.compute {
            info!(compute, "DuckDB runs in-process; compute selection ignored");
        }
        let database = quote_ident(&context.database)?;
        let schema = quote_ident(&context.schema)?;

        let sql = format!(
            "CREATE SCHEMA IF NOT EXISTS {database}.{schema}; USE {database}.{schema};"
        );
        self.blocking(move |conn| Ok(conn.execute_batch(&sql)?)).await?;
        debug!(database = %context.database, schema = %context.schema, "Selected warehouse context");
        Ok(())
    }

    async fn ensure_table(&self, table: &str) -> Result<()> {
        let sql = format!("CREATE TABLE IF NOT EXISTS {} (data JSON)", quote_ident(table)?);
        self.blocking(move |conn| Ok(conn.execute_batch(&sql)?)).await
    }

    async fn create_stage(&self, stage: &str) -> Result<()> {
        quote_ident(stage)?;
        self.stage.create(stage).await
    }

    async fn put_file(
        &self,
        local: &Path,
        stage: &str,
        compression: StageCompression,
    ) -> Result<StagedFile> {
        let file_name = local
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                Error::warehouse(format!("Cannot stage {}: no file name", local.display()))
            })?;

        let raw = tokio::fs::read(local).await?;
        let data = match compression {
            StageCompression::None => raw,
            StageCompression::Gzip => gzip(&raw)?,
        };

        let name = format!("{file_name}{}", compression.suffix());
        let size_bytes = data.len() as u64;
        self.stage.put(stage, &name, Bytes::from(data)).await?;

        Ok(StagedFile {
            stage: stage.to_string(),
            name,
            size_bytes,
        })
    }

    async fn copy_from_stage(
        &self,
        table: &str,
        file: &StagedFile,
        format: FileFormat,
    ) -> Result<usize> {
        let table = quote_ident(table)?;
        let location = self.stage.location(&file.stage, &file.name);
        let format_name = match format {
            FileFormat::NdJson => "newline_delimited",
        };
        let compression = StageCompression::of_staged(&file.name).reader_name();

        let sql = format!(
            "INSERT INTO {table} (data) SELECT json FROM read_json_objects('{}', format = '{format_name}', compression = '{compression}')",
            escape_literal(&location)
        );
        let rows = self.blocking(move |conn| Ok(conn.execute(&sql, [])?)).await?;
        debug!(location, rows, "Copied staged artifact");
        Ok(rows)
    }

    async fn insert_json_row(&self, table: &str, json: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (data) VALUES (CAST(? AS JSON))",
            quote_ident(table)?
        );
        let json = json.to_string();
        self.blocking(move |conn| {
            conn.execute(&sql, params![json])?;
            Ok(())
        })
        .await
    }

    async fn remove_staged(&self, file: &StagedFile) -> Result<()> {
        self.stage.delete(&file.stage, &file.name).await
    }

    fn describe(&self) -> String {
        format!("duckdb {} (stage: {})", self.path, self.stage.scheme())
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| Error::warehouse("DuckDB connection lock poisoned"))
}

/// Credential statements for every cloud whose variables `var` can resolve
fn cloud_storage_statements(var: impl Fn(&str) -> Option<String>) -> Vec<(&'static str, String)> {
    let mut statements = Vec::new();

    if let (Some(key_id), Some(secret)) = (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY")) {
        let region = var("AWS_DEFAULT_REGION").unwrap_or_else(|| "us-east-1".to_string());
        statements.push((
            "S3",
            format!(
                "SET s3_access_key_id = '{}'; SET s3_secret_access_key = '{}'; SET s3_region = '{}';",
                escape_literal(&key_id),
                escape_literal(&secret),
                escape_literal(&region)
            ),
        ));

        // R2, MinIO and friends
        if let Some(endpoint) = var("R2_ENDPOINT_URL").or_else(|| var("AWS_ENDPOINT")) {
            let host = endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://");
            statements.push((
                "S3 endpoint",
                format!(
                    "SET s3_endpoint = '{}'; SET s3_url_style = 'path';",
                    escape_literal(host)
                ),
            ));
        }
    }

    if let Some(service_account) = var("GOOGLE_SERVICE_ACCOUNT") {
        statements.push((
            "GCS",
            format!(
                "SET gcs_credentials_file = '{}';",
                escape_literal(&service_account)
            ),
        ));
    }

    if let Some(connection_string) = var("AZURE_STORAGE_CONNECTION_STRING") {
        statements.push((
            "Azure",
            format!(
                "INSTALL azure; LOAD azure; SET azure_storage_connection_string = '{}';",
                escape_literal(&connection_string)
            ),
        ));
    }

    statements
}

/// Quote a validated identifier
fn quote_ident(name: &str) -> Result<String> {
    if !is_identifier(name) {
        return Err(Error::warehouse(format!(
            "'{name}' is not a plain identifier"
        )));
    }
    Ok(format!("\"{name}\""))
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

//! CLI commands and argument parsing

use crate::config::ReplicationSettings;
use crate::types::{LoadMethod, LogFormat, OptionStringExt};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Full-snapshot replication of Neo4j nodes into a warehouse table
#[derive(Parser, Debug)]
#[command(name = "neo4j-snapshot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML); flags and environment override it
    #[arg(short, long, global = true, env = "NEO4J_SNAPSHOT_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty", env = "LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(flatten)]
    pub overrides: SettingsOverrides,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Replicate every node into the warehouse table
    Run,

    /// Verify source and warehouse connectivity without moving data
    Check,
}

/// Per-field overrides, read from flags or the environment
#[derive(Args, Debug, Default, Clone)]
pub struct SettingsOverrides {
    /// Neo4j URI (neo4j+s://, bolt://, https://)
    #[arg(long, global = true, env = "NEO4J_URI")]
    pub neo4j_uri: Option<String>,

    /// Neo4j user
    #[arg(long, global = true, env = "NEO4J_USER")]
    pub neo4j_user: Option<String>,

    /// Neo4j password
    #[arg(long, global = true, env = "NEO4J_PASSWORD", hide_env_values = true)]
    pub neo4j_password: Option<String>,

    /// Neo4j database
    #[arg(long, global = true, env = "NEO4J_DATABASE")]
    pub neo4j_database: Option<String>,

    /// Only replicate nodes with this label
    #[arg(long, global = true, env = "NEO4J_LABEL")]
    pub neo4j_label: Option<String>,

    /// Client-side limit on source queries per second
    #[arg(long, global = true, env = "NEO4J_REQUESTS_PER_SECOND")]
    pub neo4j_requests_per_second: Option<u32>,

    /// Warehouse database file
    #[arg(long, global = true, env = "WAREHOUSE_PATH")]
    pub warehouse_path: Option<String>,

    /// Warehouse database alias
    #[arg(long, global = true, env = "WAREHOUSE_DATABASE")]
    pub warehouse_database: Option<String>,

    /// Warehouse schema
    #[arg(long, global = true, env = "WAREHOUSE_SCHEMA")]
    pub warehouse_schema: Option<String>,

    /// Warehouse compute resource
    #[arg(long, global = true, env = "WAREHOUSE_COMPUTE")]
    pub warehouse_compute: Option<String>,

    /// Stage name
    #[arg(long, global = true, env = "WAREHOUSE_STAGE")]
    pub warehouse_stage: Option<String>,

    /// Stage storage: /path, s3://bucket/path, r2://bucket/path, gs://bucket/path, az://container/path
    #[arg(long, global = true, env = "WAREHOUSE_STAGE_URL")]
    pub warehouse_stage_url: Option<String>,

    /// Destination table
    #[arg(long, global = true, env = "WAREHOUSE_TABLE")]
    pub warehouse_table: Option<String>,

    /// Delete staged files after a successful copy
    #[arg(long, global = true, env = "WAREHOUSE_PURGE_STAGED")]
    pub warehouse_purge_staged: Option<bool>,

    /// Directory for transient batch files
    #[arg(long, global = true, env = "WAREHOUSE_TEMP_DIR")]
    pub warehouse_temp_dir: Option<PathBuf>,

    /// How batches are written
    #[arg(long, global = true, value_enum, env = "LOAD_METHOD")]
    pub load_method: Option<LoadMethod>,

    /// Nodes per batch
    #[arg(long, global = true, env = "BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Attempts per source query, including the first
    #[arg(long, global = true, env = "RETRY_MAX_ATTEMPTS")]
    pub retry_max_attempts: Option<u32>,

    /// Seconds between attempts
    #[arg(long, global = true, env = "RETRY_DELAY_SECS")]
    pub retry_delay_secs: Option<u64>,

    /// Per-call timeout in seconds (0 disables)
    #[arg(long, global = true, env = "CALL_TIMEOUT_SECS")]
    pub call_timeout_secs: Option<u64>,

    /// Prefetch the next batch while the current one loads
    #[arg(long, global = true, env = "PIPELINED")]
    pub pipelined: Option<bool>,
}

impl SettingsOverrides {
    /// Apply every override that is set.
    ///
    /// Blank strings count as unset.
    pub fn apply(&self, settings: &mut ReplicationSettings) {
        let source = &mut settings.source;
        if let Some(uri) = self.neo4j_uri.clone().none_if_empty() {
            source.uri = Some(uri);
        }
        if let Some(user) = self.neo4j_user.clone().none_if_empty() {
            source.user = user;
        }
        if let Some(password) = self.neo4j_password.clone().none_if_empty() {
            source.password = Some(password);
        }
        if let Some(database) = self.neo4j_database.clone().none_if_empty() {
            source.database = database;
        }
        if let Some(label) = self.neo4j_label.clone().none_if_empty() {
            source.label = Some(label);
        }
        if self.neo4j_requests_per_second.is_some() {
            source.requests_per_second = self.neo4j_requests_per_second;
        }

        let warehouse = &mut settings.warehouse;
        if let Some(path) = self.warehouse_path.clone().none_if_empty() {
            warehouse.path = Some(path);
        }
        if let Some(database) = self.warehouse_database.clone().none_if_empty() {
            warehouse.database = database;
        }
        if let Some(schema) = self.warehouse_schema.clone().none_if_empty() {
            warehouse.schema = schema;
        }
        if let Some(compute) = self.warehouse_compute.clone().none_if_empty() {
            warehouse.compute = Some(compute);
        }
        if let Some(stage) = self.warehouse_stage.clone().none_if_empty() {
            warehouse.stage = stage;
        }
        if let Some(stage_url) = self.warehouse_stage_url.clone().none_if_empty() {
            warehouse.stage_url = stage_url;
        }
        if let Some(table) = self.warehouse_table.clone().none_if_empty() {
            warehouse.table = table;
        }
        if let Some(purge) = self.warehouse_purge_staged {
            warehouse.purge_staged = purge;
        }
        if let Some(dir) = &self.warehouse_temp_dir {
            warehouse.temp_dir = Some(dir.clone());
        }

        if let Some(method) = self.load_method {
            settings.load_method = method;
        }
        if let Some(size) = self.batch_size {
            settings.batch_size = size;
        }
        if let Some(attempts) = self.retry_max_attempts {
            settings.retry.max_attempts = attempts;
        }
        if let Some(delay) = self.retry_delay_secs {
            settings.retry.delay_secs = delay;
        }
        if let Some(timeout) = self.call_timeout_secs {
            settings.retry.call_timeout_secs = timeout;
        }
        if let Some(pipelined) = self.pipelined {
            settings.pipelined = pipelined;
        }
    }
}

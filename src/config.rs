//! Replication settings
//!
//! One explicit settings struct, built once at startup and passed by
//! reference into the source, warehouse and loader constructors. Values come
//! from an optional YAML file, then the environment / CLI overrides applied
//! by the runner, then `validate()` before anything connects.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::types::LoadMethod;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Default number of nodes per batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default upper bound for any single collaborator call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(300);

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Check that a name is a plain SQL/Cypher identifier
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

// ============================================================================
// Top-Level Settings
// ============================================================================

/// Complete configuration of one replication run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationSettings {
    /// Graph source connection
    pub source: SourceSettings,
    /// Warehouse destination
    pub warehouse: WarehouseSettings,
    /// Nodes fetched per page
    pub batch_size: usize,
    /// Retry policy for transient failures
    pub retry: RetrySettings,
    /// How batches are written
    pub load_method: LoadMethod,
    /// Prefetch the next batch while the current one loads
    pub pipelined: bool,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            source: SourceSettings::default(),
            warehouse: WarehouseSettings::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetrySettings::default(),
            load_method: LoadMethod::default(),
            pipelined: false,
        }
    }
}

impl ReplicationSettings {
    /// Load settings from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read settings file {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load settings from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validate the settings before any connection is opened
    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.warehouse.validate()?;

        if self.batch_size == 0 {
            return Err(Error::invalid_value("batch_size", "must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_value(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Retry policy shared by every transient call site
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }
}

// ============================================================================
// Source Settings
// ============================================================================

/// Neo4j connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Server URI (`neo4j+s://`, `bolt://`, `https://`, ...)
    pub uri: Option<String>,
    /// User name
    pub user: String,
    /// Password
    pub password: Option<String>,
    /// Database name
    pub database: String,
    /// Node label to replicate (all nodes when unset)
    pub label: Option<String>,
    /// Client-side query rate limit
    pub requests_per_second: Option<u32>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            uri: None,
            user: "neo4j".to_string(),
            password: None,
            database: "neo4j".to_string(),
            label: None,
            requests_per_second: None,
        }
    }
}

impl SourceSettings {
    fn validate(&self) -> Result<()> {
        if self.uri.is_none() {
            return Err(Error::missing_field("NEO4J_URI"));
        }
        if self.password.is_none() {
            return Err(Error::missing_field("NEO4J_PASSWORD"));
        }
        if let Some(label) = &self.label {
            if !is_identifier(label) {
                return Err(Error::invalid_value("NEO4J_LABEL", format!("'{label}' is not a plain label")));
            }
        }
        Ok(())
    }

    /// The configured URI
    pub fn uri(&self) -> Result<&str> {
        self.uri
            .as_deref()
            .ok_or_else(|| Error::missing_field("NEO4J_URI"))
    }

    /// The configured password
    pub fn password(&self) -> Result<&str> {
        self.password
            .as_deref()
            .ok_or_else(|| Error::missing_field("NEO4J_PASSWORD"))
    }
}

impl std::fmt::Debug for SourceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSettings")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("label", &self.label)
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}

// ============================================================================
// Warehouse Settings
// ============================================================================

/// Warehouse destination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseSettings {
    /// Warehouse database file
    pub path: Option<String>,
    /// Database alias selected by `use_context`
    pub database: String,
    /// Schema selected by `use_context`
    pub schema: String,
    /// Compute resource selected by `use_context`
    pub compute: Option<String>,
    /// Stage name
    pub stage: String,
    /// Storage location backing the stage (local path or cloud URL)
    pub stage_url: String,
    /// Destination table
    pub table: String,
    /// Delete the staged artifact after a successful copy
    pub purge_staged: bool,
    /// Directory for transient batch files (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            path: None,
            database: "warehouse".to_string(),
            schema: "main".to_string(),
            compute: None,
            stage: "json_stage".to_string(),
            stage_url: "./stage".to_string(),
            table: "neo4j_nodes".to_string(),
            purge_staged: false,
            temp_dir: None,
        }
    }
}

impl WarehouseSettings {
    fn validate(&self) -> Result<()> {
        if self.path.is_none() {
            return Err(Error::missing_field("WAREHOUSE_PATH"));
        }

        let mut names = vec![
            ("WAREHOUSE_DATABASE", self.database.as_str()),
            ("WAREHOUSE_SCHEMA", self.schema.as_str()),
            ("WAREHOUSE_STAGE", self.stage.as_str()),
            ("WAREHOUSE_TABLE", self.table.as_str()),
        ];
        if let Some(compute) = &self.compute {
            names.push(("WAREHOUSE_COMPUTE", compute.as_str()));
        }

        for (field, name) in names {
            if !is_identifier(name) {
                return Err(Error::invalid_value(
                    field,
                    format!("'{name}' is not a plain identifier"),
                ));
            }
        }
        Ok(())
    }

    /// The configured database file
    pub fn path(&self) -> Result<&str> {
        self.path
            .as_deref()
            .ok_or_else(|| Error::missing_field("WAREHOUSE_PATH"))
    }
}

// ============================================================================
// Retry Settings
// ============================================================================

/// Fixed-delay retry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts per call, including the first
    pub max_attempts: u32,
    /// Delay between attempts in seconds
    pub delay_secs: u64,
    /// Per-call timeout in seconds (0 disables)
    pub call_timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_secs: 5,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT.as_secs(),
        }
    }
}

impl RetrySettings {
    /// Build the retry policy
    pub fn policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::fixed(self.max_attempts, Duration::from_secs(self.delay_secs));
        if self.call_timeout_secs == 0 {
            policy
        } else {
            policy.with_call_timeout(Duration::from_secs(self.call_timeout_secs))
        }
    }
}

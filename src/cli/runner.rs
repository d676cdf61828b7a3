//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::config::ReplicationSettings;
use crate::engine::{EngineConfig, ReplicationEngine, ReplicationReport};
use crate::error::{Error, Result};
use crate::loader::build_loader;
use crate::pagination::PaginatedFetcher;
use crate::retry::{with_timeout, RetryPolicy};
use crate::source::{GraphSource, Neo4jHttpSource};
use crate::warehouse::{DuckDbWarehouse, WarehouseClient, WarehouseContext};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Settings file, then overrides, then validation
    pub fn settings(&self) -> Result<ReplicationSettings> {
        let mut settings = match &self.cli.settings {
            Some(path) => ReplicationSettings::from_yaml_file(path)?,
            None => ReplicationSettings::default(),
        };
        self.cli.overrides.apply(&mut settings);
        settings.validate()?;
        Ok(settings)
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let settings = self.settings()?;
        match self.cli.command {
            Commands::Run => {
                let report = replicate(&settings).await?;
                output_message(&json!({
                    "type": "SUMMARY",
                    "summary": report,
                }));
                Ok(())
            }
            Commands::Check => check(&settings).await,
        }
    }
}

/// Run one full replication with the given settings
pub async fn replicate(settings: &ReplicationSettings) -> Result<ReplicationReport> {
    let retry = settings.retry_policy();

    let source = connect_source(settings, &retry).await?;
    let warehouse: Arc<dyn WarehouseClient> = Arc::new(connect_warehouse(settings, &retry).await?);
    prepare_warehouse(warehouse.as_ref(), settings, &retry).await?;

    let loader = build_loader(
        settings.load_method,
        warehouse,
        &settings.warehouse,
        retry.call_timeout(),
    );
    let fetcher = PaginatedFetcher::new(source, retry);
    let mut engine = ReplicationEngine::new(fetcher, loader).with_config(
        EngineConfig::new()
            .with_batch_size(settings.batch_size)
            .with_pipelined(settings.pipelined),
    );

    engine.run().await
}

/// Verify both ends without moving data
async fn check(settings: &ReplicationSettings) -> Result<()> {
    let retry = settings.retry_policy();

    let source = match connect_source(settings, &retry).await {
        Ok(source) => source,
        Err(e) => return Err(connection_failed("source", e)),
    };
    let warehouse = match connect_warehouse(settings, &retry).await {
        Ok(warehouse) => warehouse,
        Err(e) => return Err(connection_failed("warehouse", e)),
    };
    let context = WarehouseContext::from_settings(&settings.warehouse);
    let selected = warehouse.use_context(&context);
    if let Err(e) = with_timeout("use context", retry.call_timeout(), selected).await {
        return Err(connection_failed("warehouse", e));
    }

    output_message(&json!({
        "type": "CONNECTION_STATUS",
        "connectionStatus": {
            "status": "SUCCEEDED",
            "message": format!("Connected to {} and {}", source.describe(), warehouse.describe())
        }
    }));
    Ok(())
}

/// Build the Neo4j client and confirm it answers, retrying transient failures
async fn connect_source(
    settings: &ReplicationSettings,
    retry: &RetryPolicy,
) -> Result<Arc<dyn GraphSource>> {
    let source = Neo4jHttpSource::new(&settings.source, retry.call_timeout())?;
    retry
        .run_transient("source connect", || source.verify())
        .await?;
    info!(source = %source.describe(), "Connected to source");
    Ok(Arc::new(source))
}

/// Open the warehouse, retrying anything but configuration errors
async fn connect_warehouse(
    settings: &ReplicationSettings,
    retry: &RetryPolicy,
) -> Result<DuckDbWarehouse> {
    let warehouse = retry
        .run(
            "warehouse connect",
            |e| !is_config_error(e),
            || async { DuckDbWarehouse::connect(&settings.warehouse) },
        )
        .await?;
    info!(warehouse = %warehouse.describe(), "Connected to warehouse");
    Ok(warehouse)
}

async fn prepare_warehouse(
    warehouse: &dyn WarehouseClient,
    settings: &ReplicationSettings,
    retry: &RetryPolicy,
) -> Result<()> {
    let context = WarehouseContext::from_settings(&settings.warehouse);
    with_timeout("use context", retry.call_timeout(), warehouse.use_context(&context)).await?;
    with_timeout(
        "ensure table",
        retry.call_timeout(),
        warehouse.ensure_table(&settings.warehouse.table),
    )
    .await
}

fn is_config_error(error: &Error) -> bool {
    matches!(
        error,
        Error::Config { .. } | Error::MissingConfigField { .. } | Error::InvalidConfigValue { .. }
    )
}

fn connection_failed(side: &str, error: Error) -> Error {
    output_message(&json!({
        "type": "CONNECTION_STATUS",
        "connectionStatus": {
            "status": "FAILED",
            "message": format!("Connection to {side} failed: {error}")
        }
    }));
    error
}

/// Output a message on stdout, one JSON document per line
fn output_message(msg: &Value) {
    println!("{}", serde_json::to_string(msg).unwrap_or_default());
}

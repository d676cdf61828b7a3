//! neo4j-snapshot CLI
//!
//! Replicates Neo4j nodes into a warehouse table

use clap::Parser;
use neo4j_snapshot::cli::{Cli, Runner};
use neo4j_snapshot::LogFormat;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Environment overrides may live in a .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.log_format);

    let runner = Runner::new(cli);
    if let Err(e) = runner.run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries the JSON summary
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

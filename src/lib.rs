// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # neo4j-snapshot
//!
//! Full-snapshot replication of Neo4j nodes into an analytical warehouse.
//!
//! Every run reads all nodes (optionally of one label) in stable element-id
//! order, page by page, flattens each node into a JSON document and bulk
//! loads each page through a warehouse stage.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use neo4j_snapshot::{cli::replicate, ReplicationSettings, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let settings = ReplicationSettings::from_yaml_file("snapshot.yaml")?;
//!     settings.validate()?;
//!
//!     let report = replicate(&settings).await?;
//!     println!("{} nodes replicated", report.stats.records_replicated);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   pages   ┌────────────┐  records  ┌──────────────┐
//! │ GraphSource  │──────────▶│ Normalizer │──────────▶│ BatchLoader  │
//! │ (Neo4j HTTP) │  + retry  └────────────┘           │ stage + copy │
//! └──────────────┘                                    └──────┬───────┘
//!        ▲                                                   │
//!        │           ReplicationEngine (state machine)       ▼
//!        └─────────── Init → Fetching ⇄ Loading → Done  WarehouseClient
//!                                                       (DuckDB + stage)
//! ```
//!
//! Delivery is at-least-once: a failed run restarts from offset 0 and loads
//! already replicated nodes again.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the pipeline
pub mod error;

/// Common types and type aliases
pub mod types;

/// Replication settings
pub mod config;

/// Fixed-delay retry policy
pub mod retry;

/// Graph source: Neo4j Query API client and property model
pub mod source;

/// Record normalization
pub mod normalize;

/// Skip/limit pagination
pub mod pagination;

/// Warehouse client and stage storage
pub mod warehouse;

/// Batch loaders
pub mod loader;

/// Replication engine
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::ReplicationSettings;
pub use engine::{ReplicationEngine, ReplicationReport, RunState};
pub use normalize::{normalize, NormalizedRecord};
pub use retry::RetryPolicy;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

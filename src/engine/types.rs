//! Engine types
//!
//! Run state, configuration and statistics for the replication engine.

use crate::config::DEFAULT_BATCH_SIZE;
use serde::Serialize;
use std::fmt;

/// Replication run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing fetched yet
    Init,
    /// Waiting on the source for the next page
    Fetching,
    /// Normalizing and loading a page
    Loading,
    /// Source exhausted, every page loaded
    Done,
    /// Aborted on an unrecovered error
    Failed,
}

impl RunState {
    /// Check if the run has finished, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Fetching => "fetching",
            Self::Loading => "loading",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Configuration for a replication run
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Nodes per page
    pub batch_size: usize,
    /// Prefetch the next page while the current one loads
    pub pipelined: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            pipelined: false,
        }
    }
}

impl EngineConfig {
    /// Create a new engine config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set batch size
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Enable or disable pipelined prefetch
    #[must_use]
    pub fn with_pipelined(mut self, pipelined: bool) -> Self {
        self.pipelined = pipelined;
        self
    }
}

/// Statistics from a replication run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplicationStats {
    /// Total records loaded
    pub records_replicated: usize,
    /// Batches loaded
    pub batches_loaded: usize,
    /// Range queries issued, the final empty one included
    pub fetch_calls: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ReplicationStats {
    /// Record one fetch
    pub fn add_fetch(&mut self) {
        self.fetch_calls += 1;
    }

    /// Record one loaded batch
    pub fn add_batch(&mut self, rows: usize) {
        self.batches_loaded += 1;
        self.records_replicated += rows;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicationReport {
    /// Identifier attached to every log line of the run
    pub run_id: String,
    /// Terminal state
    pub state: RunState,
    /// Run statistics
    pub stats: ReplicationStats,
}

//! Replication engine module
//!
//! Drives fetcher, normalizer and loader until the source is exhausted.
//!
//! # Overview
//!
//! - `ReplicationEngine` - the run loop and its state machine
//! - `EngineConfig` - batch size and pipelining
//! - `ReplicationStats` / `ReplicationReport` - progress and final summary
//!
//! A run moves `Init -> Fetching -> (Loading -> Fetching)* -> Done`, or to
//! `Failed` on the first unrecovered error. Nothing is checkpointed, so a
//! failed run starts over from offset 0 and reloads what already landed.

mod types;

pub use types::{EngineConfig, ReplicationReport, ReplicationStats, RunState};

use crate::error::{Error, Result};
use crate::loader::BatchLoader;
use crate::normalize::normalize_batch;
use crate::pagination::{PaginatedFetcher, PaginationCursor};
use crate::source::SourceEntity;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A fetched page and the offset it was read from
type Page = (u64, Vec<SourceEntity>);

/// Replication engine for one full-snapshot run
pub struct ReplicationEngine {
    fetcher: PaginatedFetcher,
    loader: Arc<dyn BatchLoader>,
    config: EngineConfig,
    state: RunState,
    stats: ReplicationStats,
}

impl ReplicationEngine {
    /// Create a new engine
    pub fn new(fetcher: PaginatedFetcher, loader: Arc<dyn BatchLoader>) -> Self {
        Self {
            fetcher,
            loader,
            config: EngineConfig::default(),
            state: RunState::Init,
            stats: ReplicationStats::default(),
        }
    }

    /// Set engine configuration
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Current state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Get statistics
    pub fn stats(&self) -> &ReplicationStats {
        &self.stats
    }

    /// Replicate every node, from offset 0 until the first empty page.
    ///
    /// Ends in `Done` and returns the report, or ends in `Failed` and
    /// returns the error that stopped the run.
    pub async fn run(&mut self) -> Result<ReplicationReport> {
        if self.config.batch_size == 0 {
            return Err(Error::invalid_value("batch_size", "must be greater than 0"));
        }

        let start = Instant::now();
        let run_id = Uuid::new_v4().simple().to_string();
        self.stats = ReplicationStats::default();
        self.state = RunState::Init;
        info!(
            run_id = %run_id,
            batch_size = self.config.batch_size,
            pipelined = self.config.pipelined,
            load_method = ?self.loader.method(),
            "Starting replication"
        );

        let outcome = if self.config.pipelined {
            self.run_pipelined().await
        } else {
            self.run_sequential().await
        };
        self.stats
            .set_duration(start.elapsed().as_millis().try_into().unwrap_or(u64::MAX));

        match outcome {
            Ok(()) => {
                self.transition(RunState::Done);
                info!(
                    run_id = %run_id,
                    total = self.stats.records_replicated,
                    batches = self.stats.batches_loaded,
                    fetches = self.stats.fetch_calls,
                    duration_ms = self.stats.duration_ms,
                    "Replication complete"
                );
                Ok(ReplicationReport {
                    run_id,
                    state: self.state,
                    stats: self.stats.clone(),
                })
            }
            Err(e) => {
                let failed_in = self.state;
                self.transition(RunState::Failed);
                error!(
                    run_id = %run_id,
                    state = %failed_in,
                    total = self.stats.records_replicated,
                    error = %e,
                    "Replication failed"
                );
                Err(e)
            }
        }
    }

    async fn run_sequential(&mut self) -> Result<()> {
        let mut cursor = PaginationCursor::new(self.config.batch_size as u64);

        loop {
            self.transition(RunState::Fetching);
            let entities = self.fetcher.fetch_at(&cursor).await?;
            if !self.record_fetch(cursor.offset(), &entities) {
                return Ok(());
            }

            self.load_page(cursor.offset(), &entities).await?;
            cursor.advance();
        }
    }

    /// Fetch page N+1 on a separate task while page N loads
    async fn run_pipelined(&mut self) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<Result<Page>>(1);
        let fetcher = self.fetcher.clone();
        let limit = self.config.batch_size as u64;

        let producer = tokio::spawn(async move {
            let mut cursor = PaginationCursor::new(limit);
            loop {
                let result = fetcher.fetch_at(&cursor).await;
                let last = !matches!(&result, Ok(page) if !page.is_empty());
                let message = result.map(|page| (cursor.offset(), page));
                if tx.send(message).await.is_err() || last {
                    break;
                }
                cursor.advance();
            }
        });

        self.transition(RunState::Fetching);
        let outcome = loop {
            let (offset, entities) = match rx.recv().await {
                Some(Ok(page)) => page,
                Some(Err(e)) => break Err(e),
                None => break Err(Error::Other("Fetch task stopped unexpectedly".to_string())),
            };
            if !self.record_fetch(offset, &entities) {
                break Ok(());
            }

            if let Err(e) = self.load_page(offset, &entities).await {
                break Err(e);
            }
            self.transition(RunState::Fetching);
        };

        drop(rx);
        producer.abort();
        if let Err(e) = producer.await {
            if e.is_panic() {
                warn!(error = %e, "Fetch task panicked");
            }
        }
        outcome
    }

    /// Count a fetch; returns false when the page is empty
    fn record_fetch(&mut self, offset: u64, entities: &[SourceEntity]) -> bool {
        self.stats.add_fetch();
        info!(offset, fetched = entities.len(), "Fetched batch");
        !entities.is_empty()
    }

    async fn load_page(&mut self, offset: u64, entities: &[SourceEntity]) -> Result<()> {
        self.transition(RunState::Loading);
        let records = normalize_batch(entities);
        let rows = self.loader.load(&records).await?;
        self.stats.add_batch(rows);

        info!(
            offset,
            rows,
            total = self.stats.records_replicated,
            "Batch checkpoint"
        );
        Ok(())
    }

    fn transition(&mut self, next: RunState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "State transition");
            self.state = next;
        }
    }
}

impl std::fmt::Debug for ReplicationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationEngine")
            .field("fetcher", &self.fetcher)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish()
    }
}

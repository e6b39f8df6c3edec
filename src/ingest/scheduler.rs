//! Ingestion scheduler
//!
//! Periodic driver for local and single-process deployments: on each tick
//! it scans the identifier source, partitions the deduplicated set into
//! dispatch batches, publishes them to the channel and runs every batch
//! through the pipeline. In a distributed deployment the channel's consumer
//! side drives the pipeline instead; the pipeline itself is agnostic.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant};

use crate::dispatch::{
    dedup_identifiers, plan_batches, DispatchChannel, DispatchEntry, IdentifierSource,
};
use crate::error::{Error, Result};
use crate::ingest::pipeline::IngestionPipeline;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the ingestion scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between discovery runs
    pub scan_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(300),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Statistics collected by the scheduler
#[derive(Debug, Default, Clone)]
pub struct SchedulerStats {
    /// Discovery runs completed
    pub runs: u64,

    /// Batches dispatched across all runs
    pub batches_dispatched: u64,

    /// Batches whose processing failed
    pub batches_failed: u64,

    /// Identifiers seen after deduplication, latest run
    pub identifiers_seen: u64,

    /// Samples written to either tier across all runs
    pub records_written: u64,

    /// Last run start time
    pub last_run: Option<Instant>,
}

// ============================================================================
// Scheduler
// ============================================================================

/// Background driver running discovery → dispatch → ingestion on a timer
pub struct IngestScheduler {
    config: SchedulerConfig,
    identifiers: Arc<dyn IdentifierSource>,
    channel: Arc<dyn DispatchChannel>,
    pipeline: Arc<IngestionPipeline>,
    stats: RwLock<SchedulerStats>,
}

impl IngestScheduler {
    /// Create a new scheduler
    pub fn new(
        config: SchedulerConfig,
        identifiers: Arc<dyn IdentifierSource>,
        channel: Arc<dyn DispatchChannel>,
        pipeline: Arc<IngestionPipeline>,
    ) -> Self {
        Self {
            config,
            identifiers,
            channel,
            pipeline,
            stats: RwLock::new(SchedulerStats::default()),
        }
    }

    /// Get current statistics
    pub fn stats(&self) -> SchedulerStats {
        self.stats.read().clone()
    }

    /// Run one discovery-dispatch-ingest cycle
    pub async fn run_once(&self) -> Result<()> {
        let start = Instant::now();

        let scanned = self
            .identifiers
            .scan()
            .await
            .map_err(Error::Store)?;
        let identifiers = dedup_identifiers(scanned);
        let batches = plan_batches(&identifiers);

        let entries = batches
            .iter()
            .map(DispatchEntry::from_batch)
            .collect::<Result<Vec<_>>>()?;
        if !entries.is_empty() {
            self.channel.send_batch(entries).await?;
        }

        let mut dispatched = 0u64;
        let mut failed = 0u64;
        let mut written = 0u64;
        for batch in &batches {
            match self.pipeline.process(batch).await {
                Ok(report) => {
                    dispatched += 1;
                    written +=
                        (report.past.records_written + report.future.records_written) as u64;
                }
                Err(e) => {
                    // The channel's redelivery/dead-letter path owns retries
                    failed += 1;
                    tracing::error!(batch = %batch.id, error = %e, "Batch processing failed");
                }
            }
        }

        {
            let mut stats = self.stats.write();
            stats.runs += 1;
            stats.batches_dispatched += dispatched;
            stats.batches_failed += failed;
            stats.identifiers_seen = identifiers.len() as u64;
            stats.records_written += written;
            stats.last_run = Some(start);
        }

        tracing::debug!(
            identifiers = identifiers.len(),
            batches = batches.len(),
            failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Discovery run completed"
        );

        Ok(())
    }

    /// Run the periodic loop until a shutdown signal arrives
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!(
            interval_secs = self.config.scan_interval.as_secs(),
            "Ingestion scheduler started"
        );

        let mut tick = interval(self.config.scan_interval);

        loop {
            tokio::select! {
                result = shutdown.recv() => {
                    match result {
                        Ok(()) | Err(broadcast::error::RecvError::Closed) => {
                            tracing::debug!("Ingestion scheduler received shutdown signal");
                            break;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::debug!(missed = n, "Scheduler broadcast receiver lagged");
                        }
                    }
                }

                _ = tick.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Discovery run failed");
                    }
                }
            }
        }

        tracing::debug!("Ingestion scheduler stopped");
    }
}

//! Chunked tier writers
//!
//! Both backends impose a per-call record limit, so writers split their
//! input into bounded chunks and submit each chunk before the next (no
//! pipelining). Partial rejection of a chunk is logged and counted but does
//! not stop the remaining chunks; transport or backend failures abort the
//! write and propagate so the caller can surface them for redelivery.

use std::sync::Arc;

use crate::config::TableRef;
use crate::error::StoreError;
use crate::stores::{FutureStore, TimeSeriesStore};
use crate::types::{FutureItem, PastRecord, FUTURE_WRITE_CHUNK, PAST_WRITE_CHUNK};

/// Aggregated outcome of a multi-chunk write
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Chunks submitted to the backend
    pub chunks_submitted: usize,
    /// Records the backend accepted
    pub records_written: usize,
    /// Records the backend rejected inside otherwise-successful chunks
    pub records_rejected: usize,
}

impl WriteReport {
    /// Fold another report into this one
    pub fn merge(&mut self, other: &WriteReport) {
        self.chunks_submitted += other.chunks_submitted;
        self.records_written += other.records_written;
        self.records_rejected += other.records_rejected;
    }
}

/// Writer for the append-only time-partitioned tier (chunks of 100)
pub struct PastWriter {
    store: Arc<dyn TimeSeriesStore>,
    table: TableRef,
}

impl PastWriter {
    /// Create a writer bound to one table
    pub fn new(store: Arc<dyn TimeSeriesStore>, table: TableRef) -> Self {
        Self { store, table }
    }

    /// Write all records in chunks of at most [`PAST_WRITE_CHUNK`].
    ///
    /// Each chunk blocks until acknowledged. Rejected records within a
    /// chunk are logged and counted; they are not retried individually.
    pub async fn write_all(&self, records: &[PastRecord]) -> Result<WriteReport, StoreError> {
        let mut report = WriteReport::default();
        tracing::debug!(records = records.len(), "Writing past-tier records");

        for chunk in records.chunks(PAST_WRITE_CHUNK) {
            let outcome = self.store.write_records(&self.table, chunk).await?;
            report.chunks_submitted += 1;
            report.records_written += outcome.accepted;
            report.records_rejected += outcome.rejected.len();

            if !outcome.rejected.is_empty() {
                for rejected in &outcome.rejected {
                    tracing::warn!(
                        identifier = %rejected.record.identifier,
                        time = rejected.record.time,
                        reason = %rejected.reason,
                        "Past-tier record rejected"
                    );
                }
                tracing::warn!(
                    rejected = outcome.rejected.len(),
                    accepted = outcome.accepted,
                    "Chunk partially rejected; remaining records were written"
                );
            }
        }

        Ok(report)
    }
}

/// Writer for the ephemeral key-value tier (chunks of 25)
pub struct FutureWriter {
    store: Arc<dyn FutureStore>,
    table: String,
}

impl FutureWriter {
    /// Create a writer bound to one table
    pub fn new(store: Arc<dyn FutureStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    /// Upsert all items in chunks of at most [`FUTURE_WRITE_CHUNK`].
    ///
    /// Writes are idempotent by (identifier, time), so redelivering the
    /// same input cannot duplicate items.
    pub async fn write_all(&self, items: &[FutureItem]) -> Result<WriteReport, StoreError> {
        let mut report = WriteReport::default();
        tracing::debug!(items = items.len(), "Writing future-tier items");

        for chunk in items.chunks(FUTURE_WRITE_CHUNK) {
            self.store.batch_write(&self.table, chunk).await?;
            report.chunks_submitted += 1;
            report.records_written += chunk.len();
        }

        Ok(report)
    }
}

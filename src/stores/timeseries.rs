//! Append-only time-partitioned store
//!
//! The past tier. Writes go in chunks of at most [`PAST_WRITE_CHUNK`]
//! records per call and the backend may reject a subset of a chunk without
//! failing the rest; queries use relative-time range expressions and return
//! rows ordered by time descending.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::RwLock;

use crate::config::TableRef;
use crate::error::StoreError;
use crate::query::relative::RelativeTime;
use crate::types::{EpochMillis, PastRecord, PAST_WRITE_CHUNK};

// ============================================================================
// Store API
// ============================================================================

/// One row returned by a time-partitioned query.
///
/// Times come back as RFC 3339 strings, the way the backend's
/// `to_iso8601(time)` projection renders them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRow {
    pub identifier: String,
    pub value: String,
    pub time: String,
}

/// A record the backend refused, with its stated reason
#[derive(Debug, Clone)]
pub struct RejectedRecord {
    pub record: PastRecord,
    pub reason: String,
}

/// Outcome of one chunked write call
#[derive(Debug, Default)]
pub struct WriteOutcome {
    /// Records the backend accepted
    pub accepted: usize,
    /// Records the backend rejected; the rest of the chunk still landed
    pub rejected: Vec<RejectedRecord>,
}

/// A relative-time range select against one identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    /// Identifier the rows must match
    pub identifier: String,
    /// Translated lower bound
    pub start: RelativeTime,
    /// Translated upper bound
    pub end: RelativeTime,
}

impl SelectQuery {
    /// Render the SQL-like query string a real backend would execute
    pub fn to_sql(&self, table: &TableRef) -> String {
        format!(
            "SELECT identifier, measure_value::varchar AS cpu, \
             concat(to_iso8601(time), 'Z') AS time \
             FROM \"{}\".\"{}\" \
             WHERE identifier = '{}' \
             AND time BETWEEN {} AND {} \
             ORDER BY time DESC",
            table.database, table.table, self.identifier, self.start, self.end
        )
    }
}

/// Append-only time-partitioned storage tier
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Write one chunk of at most [`PAST_WRITE_CHUNK`] records.
    ///
    /// Partial rejection is reported in the outcome, not as an error;
    /// transport or backend failures are errors.
    async fn write_records(
        &self,
        table: &TableRef,
        records: &[PastRecord],
    ) -> Result<WriteOutcome, StoreError>;

    /// Execute a relative-range select, rows ordered by time descending
    async fn query(
        &self,
        table: &TableRef,
        select: &SelectQuery,
    ) -> Result<Vec<StoreRow>, StoreError>;
}

// ============================================================================
// In-memory engine
// ============================================================================

/// In-memory time-partitioned engine for tests and local runs.
///
/// Rows are keyed by (identifier, time) and written as upserts, so a
/// redelivered batch converges to the same state instead of duplicating
/// records. Records with non-positive timestamps are rejected per chunk,
/// which exercises the partial-rejection path.
#[derive(Debug, Default)]
pub struct InMemoryTimeSeriesStore {
    rows: RwLock<BTreeMap<(String, i64), PastRecord>>,
    write_call_sizes: RwLock<Vec<usize>>,
}

impl InMemoryTimeSeriesStore {
    /// Create an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes of the chunks submitted so far, in call order
    pub fn write_call_sizes(&self) -> Vec<usize> {
        self.write_call_sizes.read().clone()
    }

    /// Number of stored rows
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// True when no rows are stored
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    fn render_time(seconds: i64) -> Result<String, StoreError> {
        Utc.timestamp_opt(seconds, 0)
            .single()
            .map(|dt| dt.to_rfc3339())
            .ok_or_else(|| StoreError::MalformedRow(format!("timestamp {seconds} out of range")))
    }
}

#[async_trait]
impl TimeSeriesStore for InMemoryTimeSeriesStore {
    async fn write_records(
        &self,
        _table: &TableRef,
        records: &[PastRecord],
    ) -> Result<WriteOutcome, StoreError> {
        if records.len() > PAST_WRITE_CHUNK {
            return Err(StoreError::ChunkTooLarge {
                limit: PAST_WRITE_CHUNK,
                got: records.len(),
            });
        }
        self.write_call_sizes.write().push(records.len());

        let mut outcome = WriteOutcome::default();
        let mut rows = self.rows.write();
        for record in records {
            if record.time <= 0 {
                outcome.rejected.push(RejectedRecord {
                    record: record.clone(),
                    reason: "record timestamp outside the table retention window".to_string(),
                });
                continue;
            }
            rows.insert((record.identifier.clone(), record.time), record.clone());
            outcome.accepted += 1;
        }
        Ok(outcome)
    }

    async fn query(
        &self,
        _table: &TableRef,
        select: &SelectQuery,
    ) -> Result<Vec<StoreRow>, StoreError> {
        // Relative bounds are evaluated against the engine's own clock, the
        // way a real backend evaluates ago()/now() server-side.
        let now_ms: EpochMillis = Utc::now().timestamp_millis();
        let start_ms = select.start.resolve(now_ms);
        let end_ms = select.end.resolve(now_ms);

        let rows = self.rows.read();
        let mut matched: Vec<&PastRecord> = rows
            .values()
            .filter(|r| r.identifier == select.identifier)
            .filter(|r| {
                let t = r.time * 1000;
                t >= start_ms && t <= end_ms
            })
            .collect();
        matched.sort_by_key(|r| std::cmp::Reverse(r.time));

        matched
            .into_iter()
            .map(|r| {
                Ok(StoreRow {
                    identifier: r.identifier.clone(),
                    value: r.measure_value.clone(),
                    time: Self::render_time(r.time)?,
                })
            })
            .collect()
    }
}

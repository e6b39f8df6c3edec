//! Core data types used throughout the service

use serde::{Deserialize, Serialize};

/// Epoch timestamp in whole seconds
pub type EpochSeconds = i64;

/// Epoch timestamp in milliseconds
pub type EpochMillis = i64;

/// Maximum identifiers per dispatch batch
pub const BATCH_SIZE: usize = 2;

/// Per-call record limit of the time-partitioned backend
pub const PAST_WRITE_CHUNK: usize = 100;

/// Per-call item limit of the ephemeral key-value backend
pub const FUTURE_WRITE_CHUNK: usize = 25;

/// Ephemeral items expire this long after ingestion
pub const FUTURE_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Measure name stamped on every past-tier record
pub const MEASURE_NAME: &str = "cpu usage";

/// A single raw sample produced by the upstream data source.
///
/// Immutable once created; the ingestion pipeline routes it to exactly one
/// storage tier based on its timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Logical time-series key
    pub identifier: String,
    /// Sample time in epoch seconds
    pub time: EpochSeconds,
    /// Measured value, kept as the source delivered it
    pub value: String,
    /// Free-form source metadata
    pub metadata: String,
}

impl Sample {
    /// Create a new sample
    pub fn new(
        identifier: impl Into<String>,
        time: EpochSeconds,
        value: impl Into<String>,
        metadata: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            time,
            value: value.into(),
            metadata: metadata.into(),
        }
    }
}

/// A sample mapped to the time-partitioned store's record shape.
///
/// One dimension (the identifier), one varchar measure, time in seconds.
/// The past tier is append-only; there is no update or delete path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastRecord {
    /// Identifier dimension value
    pub identifier: String,
    /// Measure name (`cpu usage`)
    pub measure_name: String,
    /// Measure value as varchar
    pub measure_value: String,
    /// Record time in epoch seconds
    pub time: EpochSeconds,
}

impl PastRecord {
    /// Map a raw sample into the past-tier record shape
    pub fn from_sample(sample: &Sample) -> Self {
        Self {
            identifier: sample.identifier.clone(),
            measure_name: MEASURE_NAME.to_string(),
            measure_value: sample.value.clone(),
            time: sample.time,
        }
    }
}

/// A sample destined for the ephemeral key-value tier.
///
/// Keyed by (identifier, time); writes are upserts, so redelivery of the
/// same item is safe. `expiry` drives the store's automatic TTL cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureItem {
    /// Partition key
    pub identifier: String,
    /// Sort key, epoch seconds
    pub time: EpochSeconds,
    /// Measured value
    pub value: String,
    /// Free-form source metadata
    pub metadata: String,
    /// Serialized original sample
    pub document: String,
    /// TTL attribute, epoch seconds
    pub expiry: EpochSeconds,
}

/// A group of identifiers dispatched as one ingestion unit.
///
/// Batches partition the identifier set exactly: their union equals the
/// input set and no identifier appears twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchBatch {
    /// Unique entry id within a dispatch run
    pub id: String,
    /// At most [`BATCH_SIZE`] identifiers
    pub identifiers: Vec<String>,
}

/// One row of a query response, times in epoch milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRow {
    pub identifier: String,
    pub cpu: String,
    pub time: EpochMillis,
}

/// Combined result of a range query.
///
/// The two arrays come from different tiers and are returned unmerged and
/// undeduplicated; callers interpret them as distinct sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(rename = "historicalRows")]
    pub historical_rows: Vec<ReturnRow>,
    #[serde(rename = "futureRows")]
    pub future_rows: Vec<ReturnRow>,
}

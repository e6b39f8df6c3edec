//! Identifier discovery and dispatch
//!
//! Discovery scans the identifier source, deduplicates into a set (first
//! appearance wins, preserving a deterministic batching order), partitions
//! the set into fixed-size [`DispatchBatch`] groups and publishes them to
//! the dispatch channel. Delivery guarantees (redelivery, dead-lettering)
//! belong to the channel, not to this module.

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result, StoreError};
use crate::types::{DispatchBatch, BATCH_SIZE};

// ============================================================================
// Batching
// ============================================================================

/// Deduplicate identifiers, keeping the first appearance of each
pub fn dedup_identifiers<I>(identifiers: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    identifiers
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Partition a deduplicated identifier set into dispatch batches.
///
/// Walks the set in order, emitting groups of at most [`BATCH_SIZE`]
/// identifiers; a trailing partial group is still emitted. Every identifier
/// lands in exactly one batch. Batch ids are `<seq>-<run id>` so entries
/// stay unique within one dispatch run.
pub fn plan_batches(identifiers: &[String]) -> Vec<DispatchBatch> {
    let run_id = Uuid::new_v4();
    identifiers
        .chunks(BATCH_SIZE)
        .enumerate()
        .map(|(seq, group)| DispatchBatch {
            id: format!("{seq}-{run_id}"),
            identifiers: group.to_vec(),
        })
        .collect()
}

// ============================================================================
// External seams
// ============================================================================

/// Source of known identifiers; a full scan returns all current values
#[async_trait]
pub trait IdentifierSource: Send + Sync {
    /// Scan all known identifiers (duplicates allowed; callers deduplicate)
    async fn scan(&self) -> std::result::Result<Vec<String>, StoreError>;
}

/// Fixed identifier list, for tests and local runs
#[derive(Debug, Default)]
pub struct StaticIdentifierSource {
    identifiers: Vec<String>,
}

impl StaticIdentifierSource {
    /// Create a source over a fixed list
    pub fn new(identifiers: Vec<String>) -> Self {
        Self { identifiers }
    }
}

#[async_trait]
impl IdentifierSource for StaticIdentifierSource {
    async fn scan(&self) -> std::result::Result<Vec<String>, StoreError> {
        Ok(self.identifiers.clone())
    }
}

/// One message handed to the dispatch channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEntry {
    /// Unique id within the send-batch call
    pub id: String,
    /// Serialized [`DispatchBatch`]
    pub body: String,
}

impl DispatchEntry {
    /// Serialize a batch into a channel entry
    pub fn from_batch(batch: &DispatchBatch) -> Result<Self> {
        let body = serde_json::to_string(batch)
            .map_err(|e| Error::Dispatch(format!("batch serialization failed: {e}")))?;
        Ok(Self {
            id: batch.id.clone(),
            body,
        })
    }

    /// Parse a delivered entry body back into a batch
    pub fn parse_body(body: &str) -> Result<DispatchBatch> {
        serde_json::from_str(body)
            .map_err(|e| Error::Dispatch(format!("malformed batch body: {e}")))
    }
}

/// At-least-once message delivery channel.
///
/// Redelivery after a visibility timeout and routing to a dead-letter path
/// after repeated failures are the channel's responsibility.
#[async_trait]
pub trait DispatchChannel: Send + Sync {
    /// Publish a batch of entries
    async fn send_batch(&self, entries: Vec<DispatchEntry>) -> Result<()>;
}

/// In-memory channel collecting everything sent through it
#[derive(Debug, Default)]
pub struct InMemoryChannel {
    sent: Mutex<Vec<DispatchEntry>>,
}

impl InMemoryChannel {
    /// Create an empty channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything published so far
    pub fn drain(&self) -> Vec<DispatchEntry> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    /// True when nothing has been published
    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

#[async_trait]
impl DispatchChannel for InMemoryChannel {
    async fn send_batch(&self, entries: Vec<DispatchEntry>) -> Result<()> {
        self.sent.lock().extend(entries);
        Ok(())
    }
}

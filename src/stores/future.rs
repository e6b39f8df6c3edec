//! Ephemeral key-value store
//!
//! The future tier. Items are upserts keyed by (identifier, time) in chunks
//! of at most [`FUTURE_WRITE_CHUNK`] per call, each carrying an `expiry`
//! attribute the backend uses to expire them automatically. Range queries
//! address one identifier across a sort-key window in seconds.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::types::{EpochSeconds, FutureItem, FUTURE_WRITE_CHUNK};

/// Ephemeral key-value storage tier
#[async_trait]
pub trait FutureStore: Send + Sync {
    /// Upsert one chunk of at most [`FUTURE_WRITE_CHUNK`] items by
    /// (identifier, time); redelivering the same chunk is safe.
    async fn batch_write(&self, table: &str, items: &[FutureItem]) -> Result<(), StoreError>;

    /// Range query for one identifier over an inclusive sort-key window
    /// in epoch seconds. Expired items are invisible.
    async fn query_range(
        &self,
        table: &str,
        identifier: &str,
        start: EpochSeconds,
        end: EpochSeconds,
    ) -> Result<Vec<FutureItem>, StoreError>;
}

/// In-memory ephemeral engine for tests and local runs
#[derive(Debug, Default)]
pub struct InMemoryFutureStore {
    items: RwLock<BTreeMap<(String, i64), FutureItem>>,
    write_call_sizes: RwLock<Vec<usize>>,
    query_calls: RwLock<u64>,
}

impl InMemoryFutureStore {
    /// Create an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes of the chunks submitted so far, in call order
    pub fn write_call_sizes(&self) -> Vec<usize> {
        self.write_call_sizes.read().clone()
    }

    /// Number of range queries served
    pub fn query_count(&self) -> u64 {
        *self.query_calls.read()
    }

    /// Number of stored items, expired ones included
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// True when no items are stored
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Snapshot of all stored items, expired ones included
    pub fn snapshot(&self) -> Vec<FutureItem> {
        self.items.read().values().cloned().collect()
    }
}

#[async_trait]
impl FutureStore for InMemoryFutureStore {
    async fn batch_write(&self, _table: &str, items: &[FutureItem]) -> Result<(), StoreError> {
        if items.len() > FUTURE_WRITE_CHUNK {
            return Err(StoreError::ChunkTooLarge {
                limit: FUTURE_WRITE_CHUNK,
                got: items.len(),
            });
        }
        self.write_call_sizes.write().push(items.len());

        let mut stored = self.items.write();
        for item in items {
            stored.insert((item.identifier.clone(), item.time), item.clone());
        }
        Ok(())
    }

    async fn query_range(
        &self,
        _table: &str,
        identifier: &str,
        start: EpochSeconds,
        end: EpochSeconds,
    ) -> Result<Vec<FutureItem>, StoreError> {
        *self.query_calls.write() += 1;
        let now = Utc::now().timestamp();
        let items = self.items.read();
        Ok(items
            .range((identifier.to_string(), start)..=(identifier.to_string(), end))
            .map(|(_, item)| item)
            .filter(|item| item.expiry > now)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(identifier: &str, time: i64, value: &str, expiry: i64) -> FutureItem {
        FutureItem {
            identifier: identifier.to_string(),
            time,
            value: value.to_string(),
            metadata: "Future".to_string(),
            document: String::new(),
            expiry,
        }
    }

    #[tokio::test]
    async fn test_chunk_limit_enforced() {
        let store = InMemoryFutureStore::new();
        let far = Utc::now().timestamp() + 3600;
        let items: Vec<_> = (0..26).map(|i| item("a", 1000 + i, "1", far)).collect();
        let err = store.batch_write("future", &items).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::ChunkTooLarge { limit: 25, got: 26 }
        ));
    }

    #[tokio::test]
    async fn test_upsert_by_key() {
        let store = InMemoryFutureStore::new();
        let far = Utc::now().timestamp() + 3600;
        store
            .batch_write("future", &[item("a", 1000, "first", far)])
            .await
            .unwrap();
        store
            .batch_write("future", &[item("a", 1000, "second", far)])
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let found = store.query_range("future", "a", 0, 2000).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "second");
    }

    #[tokio::test]
    async fn test_range_query_scoped_to_identifier_and_window() {
        let store = InMemoryFutureStore::new();
        let far = Utc::now().timestamp() + 3600;
        let items = vec![
            item("a", 100, "1", far),
            item("a", 200, "2", far),
            item("a", 300, "3", far),
            item("b", 200, "4", far),
        ];
        store.batch_write("future", &items).await.unwrap();

        let found = store.query_range("future", "a", 150, 250).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "2");
    }

    #[tokio::test]
    async fn test_expired_items_are_invisible() {
        let store = InMemoryFutureStore::new();
        let now = Utc::now().timestamp();
        store
            .batch_write(
                "future",
                &[item("a", 100, "dead", now - 10), item("a", 200, "live", now + 3600)],
            )
            .await
            .unwrap();

        let found = store.query_range("future", "a", 0, 1000).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "live");
    }
}

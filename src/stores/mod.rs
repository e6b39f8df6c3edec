//! Storage tier traits and in-memory engines
//!
//! The two backends are external collaborators with stated APIs: an
//! append-only time-partitioned store for past samples and an ephemeral
//! key-value store for future ones. Both are modeled as object-safe traits
//! so real clients and the in-memory engines used in tests and local runs
//! are interchangeable.

pub mod future;
pub mod timeseries;

pub use future::{FutureStore, InMemoryFutureStore};
pub use timeseries::{
    InMemoryTimeSeriesStore, RejectedRecord, SelectQuery, StoreRow, TimeSeriesStore, WriteOutcome,
};

//! # Horizon TSDB
//!
//! Two-tier time-series ingestion and query service. Incoming samples are
//! routed at ingestion time: timestamps in the past go to an append-only
//! time-partitioned store, timestamps at or beyond `now` go to an ephemeral
//! key-value store with a seven-day TTL. Range queries hit the historical
//! tier first and consult the ephemeral tier only when the requested window
//! extends past what the historical tier holds.
//!
//! # Architecture
//!
//! ```text
//! identifier source ──▶ batcher ──▶ dispatch channel
//!                                        │
//!                                        ▼
//!                              IngestionPipeline
//!                     fetch ──▶ classify ──▶ {past, future} writers
//!                                        │
//!                        ┌───────────────┴──────────────┐
//!                        ▼                              ▼
//!             time-partitioned store          ephemeral key-value store
//!                        ▲                              ▲
//!                        └───────── QueryCoordinator ───┘
//!                                        ▲
//!                                 GET /timeSeries-data
//! ```
//!
//! Store backends, the data source and the credential store are object-safe
//! trait seams; in-memory engines back tests and local runs, real clients
//! plug in unchanged.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod query;
pub mod source;
pub mod stores;
pub mod types;

pub use config::{ApiKeySpec, ServiceConfig, TableRef};
pub use error::{Error, Result};
pub use ingest::{IngestReport, IngestionPipeline};
pub use query::{QueryCoordinator, RangeQuery};
pub use types::{DispatchBatch, QueryResult, ReturnRow, Sample};

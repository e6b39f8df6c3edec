//! Ingestion pipeline module
//!
//! Turns delivered dispatch batches into store writes:
//!
//! ```text
//! DispatchBatch ──▶ fetch per identifier ──▶ classify (one `now` snapshot)
//!                                              │
//!                              ┌───────────────┴───────────────┐
//!                              ▼                               ▼
//!                     PastWriter (≤100/call)          FutureWriter (≤25/call)
//!                     time-partitioned tier           ephemeral tier (TTL)
//! ```

pub mod classifier;
pub mod pipeline;
pub mod scheduler;
pub mod writer;

pub use classifier::{classify, Classified};
pub use pipeline::{IngestReport, IngestionPipeline, PipelineBuilder};
pub use scheduler::{IngestScheduler, SchedulerConfig, SchedulerStats};
pub use writer::{FutureWriter, PastWriter, WriteReport};

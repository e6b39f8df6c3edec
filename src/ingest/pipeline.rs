//! Ingestion pipeline
//!
//! For one delivered [`DispatchBatch`]: fetch raw samples per identifier
//! from the data source, classify the accumulated set once under a single
//! `now` snapshot, then write the past subset to the time-partitioned tier
//! and the future subset to the ephemeral tier. Batches may be processed
//! concurrently; the only shared state between executions is the stores,
//! which tolerate concurrent writers (append/upsert designs).

use std::sync::Arc;

use chrono::Utc;

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::ingest::classifier::classify;
use crate::ingest::writer::{FutureWriter, PastWriter, WriteReport};
use crate::source::{CredentialCache, DataSource};
use crate::stores::{FutureStore, TimeSeriesStore};
use crate::types::{DispatchBatch, EpochSeconds, Sample};

/// Aggregated outcome of processing one dispatch batch.
///
/// Surfaced to the caller (the delivery layer) instead of being logged and
/// forgotten, so failed batches can be redelivered or alerted on.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    /// Identifiers fetched in this batch
    pub identifiers: usize,
    /// Samples accumulated across all fetches
    pub samples_fetched: usize,
    /// Past-tier write outcome
    pub past: WriteReport,
    /// Future-tier write outcome
    pub future: WriteReport,
}

/// Orchestrates fetch → classify → write for dispatch batches
pub struct IngestionPipeline {
    source: Arc<dyn DataSource>,
    credentials: Arc<CredentialCache>,
    past_writer: PastWriter,
    future_writer: FutureWriter,
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline").finish_non_exhaustive()
    }
}

impl IngestionPipeline {
    /// Start building a pipeline
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Process one dispatch batch end to end
    pub async fn process(&self, batch: &DispatchBatch) -> Result<IngestReport> {
        let api_key = self.credentials.resolve().await?;

        let mut samples: Vec<Sample> = Vec::new();
        for identifier in &batch.identifiers {
            let fetched = self
                .source
                .fetch(identifier, &api_key)
                .await
                .map_err(Error::Source)?;
            tracing::debug!(
                identifier = %identifier,
                samples = fetched.len(),
                "Fetched samples"
            );
            samples.extend(fetched);
        }

        // One snapshot for the whole batch; routing must not drift while
        // the batch is being classified.
        let now: EpochSeconds = Utc::now().timestamp();
        let classified = classify(&samples, now);

        let mut report = IngestReport {
            identifiers: batch.identifiers.len(),
            samples_fetched: samples.len(),
            ..IngestReport::default()
        };

        if !classified.past.is_empty() {
            report.past = self.past_writer.write_all(&classified.past).await?;
        }
        if !classified.future.is_empty() {
            report.future = self.future_writer.write_all(&classified.future).await?;
        }

        tracing::info!(
            batch = %batch.id,
            identifiers = report.identifiers,
            samples = report.samples_fetched,
            past_written = report.past.records_written,
            past_rejected = report.past.records_rejected,
            future_written = report.future.records_written,
            "Batch ingested"
        );

        Ok(report)
    }
}

/// Builder wiring the pipeline's seams.
///
/// All four collaborators plus the configuration are required; a missing
/// one fails the build with a configuration error before any I/O happens.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<ServiceConfig>,
    source: Option<Arc<dyn DataSource>>,
    credentials: Option<Arc<CredentialCache>>,
    timeseries: Option<Arc<dyn TimeSeriesStore>>,
    future: Option<Arc<dyn FutureStore>>,
}

impl PipelineBuilder {
    /// Set the validated service configuration
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the upstream data source
    pub fn with_source<S: DataSource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Set the credential cache
    pub fn with_credentials(mut self, credentials: Arc<CredentialCache>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the time-partitioned store client
    pub fn with_timeseries_store(mut self, store: Arc<dyn TimeSeriesStore>) -> Self {
        self.timeseries = Some(store);
        self
    }

    /// Set the ephemeral store client
    pub fn with_future_store(mut self, store: Arc<dyn FutureStore>) -> Self {
        self.future = Some(store);
        self
    }

    /// Build the pipeline, failing fast on any missing piece
    pub fn build(self) -> Result<IngestionPipeline> {
        let config = self
            .config
            .ok_or_else(|| Error::Configuration("No service configuration provided".to_string()))?;
        let source = self
            .source
            .ok_or_else(|| Error::Configuration("No data source configured".to_string()))?;
        let credentials = self
            .credentials
            .ok_or_else(|| Error::Configuration("No credential cache configured".to_string()))?;
        let timeseries = self
            .timeseries
            .ok_or_else(|| Error::Configuration("No time-partitioned store configured".to_string()))?;
        let future = self
            .future
            .ok_or_else(|| Error::Configuration("No ephemeral store configured".to_string()))?;

        Ok(IngestionPipeline {
            source,
            credentials,
            past_writer: PastWriter::new(timeseries, config.timeseries.clone()),
            future_writer: FutureWriter::new(future, config.future_table.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKeySpec, TableRef};
    use crate::error::SourceError;
    use crate::query::coordinator::{QueryCoordinator, RangeQuery};
    use crate::stores::{InMemoryFutureStore, InMemoryTimeSeriesStore};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Source returning a fixed sample list per fetch
    struct FixedSource {
        samples: Vec<Sample>,
        keys_seen: Mutex<Vec<String>>,
    }

    impl FixedSource {
        fn new(samples: Vec<Sample>) -> Self {
            Self {
                samples,
                keys_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DataSource for FixedSource {
        async fn fetch(
            &self,
            identifier: &str,
            api_key: &str,
        ) -> std::result::Result<Vec<Sample>, SourceError> {
            self.keys_seen.lock().push(api_key.to_string());
            Ok(self
                .samples
                .iter()
                .filter(|s| s.identifier == identifier)
                .cloned()
                .collect())
        }
    }

    fn config() -> ServiceConfig {
        ServiceConfig::new(
            TableRef::new("tsdb", "samples"),
            "future",
            ApiKeySpec::Literal("secret".to_string()),
        )
    }

    fn credentials() -> Arc<CredentialCache> {
        Arc::new(CredentialCache::new(
            ApiKeySpec::Literal("secret".to_string()),
            None,
        ))
    }

    struct Fixture {
        pipeline: IngestionPipeline,
        timeseries: Arc<InMemoryTimeSeriesStore>,
        future: Arc<InMemoryFutureStore>,
    }

    fn fixture(samples: Vec<Sample>) -> Fixture {
        let timeseries = Arc::new(InMemoryTimeSeriesStore::new());
        let future = Arc::new(InMemoryFutureStore::new());
        let pipeline = IngestionPipeline::builder()
            .with_config(config())
            .with_source(FixedSource::new(samples))
            .with_credentials(credentials())
            .with_timeseries_store(timeseries.clone())
            .with_future_store(future.clone())
            .build()
            .unwrap();
        Fixture {
            pipeline,
            timeseries,
            future,
        }
    }

    fn batch(identifiers: &[&str]) -> DispatchBatch {
        DispatchBatch {
            id: "0-test".to_string(),
            identifiers: identifiers.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_builder_fails_fast_on_missing_pieces() {
        let err = IngestionPipeline::builder().build().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = IngestionPipeline::builder()
            .with_config(config())
            .with_credentials(credentials())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[tokio::test]
    async fn test_batch_routes_samples_to_both_tiers() {
        let now = Utc::now().timestamp();
        let fx = fixture(vec![
            Sample::new("11111", now - 3600, "42", "Past"),
            Sample::new("11111", now + 3600, "7", "Future"),
        ]);

        let report = fx.pipeline.process(&batch(&["11111"])).await.unwrap();
        assert_eq!(report.identifiers, 1);
        assert_eq!(report.samples_fetched, 2);
        assert_eq!(report.past.records_written, 1);
        assert_eq!(report.future.records_written, 1);
        assert_eq!(fx.timeseries.len(), 1);
        assert_eq!(fx.future.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_subsets_skip_writers() {
        let now = Utc::now().timestamp();
        let fx = fixture(vec![Sample::new("11111", now - 3600, "42", "Past")]);

        let report = fx.pipeline.process(&batch(&["11111"])).await.unwrap();
        assert_eq!(report.future, WriteReport::default());
        assert!(fx.future.write_call_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_redelivered_batch_is_idempotent_on_future_tier() {
        let now = Utc::now().timestamp();
        let fx = fixture(vec![
            Sample::new("11111", now + 600, "7", "Future"),
            Sample::new("11111", now + 1200, "8", "Future"),
        ]);

        let delivery = batch(&["11111"]);
        fx.pipeline.process(&delivery).await.unwrap();
        let after_first = fx.future.snapshot();
        fx.pipeline.process(&delivery).await.unwrap();
        let after_second = fx.future.snapshot();

        assert_eq!(after_first.len(), 2);
        // Values are identical, only expiry may move with the clock
        assert_eq!(
            after_first
                .iter()
                .map(|i| (i.identifier.clone(), i.time, i.value.clone()))
                .collect::<Vec<_>>(),
            after_second
                .iter()
                .map(|i| (i.identifier.clone(), i.time, i.value.clone()))
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_partial_rejection_is_non_fatal() {
        let now = Utc::now().timestamp();
        let fx = fixture(vec![
            Sample::new("11111", -5, "bad", "Past"),
            Sample::new("11111", now - 60, "good", "Past"),
        ]);

        let report = fx.pipeline.process(&batch(&["11111"])).await.unwrap();
        assert_eq!(report.past.records_written, 1);
        assert_eq!(report.past.records_rejected, 1);
        assert_eq!(fx.timeseries.len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_ingest_then_query() {
        let now_s = Utc::now().timestamp();
        let fx = fixture(vec![
            Sample::new("11111", now_s - 3600, "42", "Past"),
            Sample::new("11111", now_s + 3600, "7", "Future"),
        ]);
        fx.pipeline.process(&batch(&["11111"])).await.unwrap();

        let coordinator = QueryCoordinator::new(
            config(),
            credentials(),
            fx.timeseries.clone(),
            fx.future.clone(),
        );
        let query = RangeQuery::try_new(
            Some("11111".to_string()),
            Some(((now_s - 7200) * 1000).to_string()),
            Some(((now_s + 7200) * 1000).to_string()),
        )
        .unwrap();
        let result = coordinator.fetch_range(&query).await.unwrap();

        assert!(result
            .historical_rows
            .iter()
            .any(|r| r.identifier == "11111" && r.cpu == "42"));
        assert!(result
            .future_rows
            .iter()
            .any(|r| r.identifier == "11111" && r.cpu == "7"));
    }
}

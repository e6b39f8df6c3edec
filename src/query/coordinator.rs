//! Query coordination across both tiers
//!
//! A range query always hits the time-partitioned store first, with its
//! absolute bounds translated into relative-time expressions. The ephemeral
//! store is consulted only when the historical result cannot have covered
//! the requested window: either it came back empty, or its most recent row
//! is older than the requested end. The two result sets are returned as-is,
//! unmerged and undeduplicated.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::ServiceConfig;
use crate::error::{Error, Result, StoreError};
use crate::query::relative::RelativeTime;
use crate::source::CredentialCache;
use crate::stores::{FutureStore, SelectQuery, TimeSeriesStore};
use crate::types::{EpochMillis, QueryResult, ReturnRow};

/// A validated range query.
///
/// Construction checks presence and shape of every parameter before any
/// store is touched; a failure here never reaches a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    /// Time-series identifier
    pub identifier: String,
    /// Inclusive range start, epoch milliseconds
    pub start_ms: EpochMillis,
    /// Inclusive range end, epoch milliseconds
    pub end_ms: EpochMillis,
}

impl RangeQuery {
    /// Validate raw request parameters into a query
    pub fn try_new(
        identifier: Option<String>,
        start_date: Option<String>,
        end_date: Option<String>,
    ) -> Result<Self> {
        let identifier = identifier
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Validation("identifier query parameter missing".to_string()))?;
        let start_ms = parse_epoch_ms("startDate", start_date)?;
        let end_ms = parse_epoch_ms("endDate", end_date)?;

        if start_ms > end_ms {
            return Err(Error::Validation(
                "startDate must not be after endDate".to_string(),
            ));
        }

        Ok(Self {
            identifier,
            start_ms,
            end_ms,
        })
    }
}

fn parse_epoch_ms(name: &str, value: Option<String>) -> Result<EpochMillis> {
    let raw = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Validation(format!("{name} query parameter missing")))?;
    raw.parse::<EpochMillis>()
        .map_err(|_| Error::Validation(format!("{name} is not an epoch-millisecond integer")))
}

/// Coordinates a two-tier range read
pub struct QueryCoordinator {
    config: ServiceConfig,
    credentials: Arc<CredentialCache>,
    timeseries: Arc<dyn TimeSeriesStore>,
    future: Arc<dyn FutureStore>,
}

impl QueryCoordinator {
    /// Create a coordinator over the two store clients
    pub fn new(
        config: ServiceConfig,
        credentials: Arc<CredentialCache>,
        timeseries: Arc<dyn TimeSeriesStore>,
        future: Arc<dyn FutureStore>,
    ) -> Self {
        Self {
            config,
            credentials,
            timeseries,
            future,
        }
    }

    /// Validate a caller-presented credential token.
    ///
    /// Mismatch is terminal; it is never retried and no store is queried.
    pub async fn authorize(&self, token: Option<&str>) -> Result<()> {
        let secret = self.credentials.resolve().await?;
        match token {
            Some(presented) if presented == secret => Ok(()),
            Some(_) => Err(Error::Auth("x-security-token incorrect".to_string())),
            None => Err(Error::Auth("x-security-token not present".to_string())),
        }
    }

    /// Execute a validated range query against both tiers
    pub async fn fetch_range(&self, query: &RangeQuery) -> Result<QueryResult> {
        self.fetch_range_at(query, Utc::now().timestamp_millis())
            .await
    }

    /// Execute against an explicit `now` snapshot (exposed for tests)
    pub async fn fetch_range_at(
        &self,
        query: &RangeQuery,
        now_ms: EpochMillis,
    ) -> Result<QueryResult> {
        let select = SelectQuery {
            identifier: query.identifier.clone(),
            start: RelativeTime::from_absolute(query.start_ms, now_ms),
            end: RelativeTime::from_absolute(query.end_ms, now_ms),
        };
        tracing::debug!(
            sql = %select.to_sql(&self.config.timeseries),
            "Querying time-partitioned tier"
        );

        let rows = self
            .timeseries
            .query(&self.config.timeseries, &select)
            .await
            .map_err(Error::Store)?;

        let historical_rows = rows
            .into_iter()
            .map(|row| {
                let time = parse_row_time(&row.time)?;
                Ok(ReturnRow {
                    identifier: row.identifier,
                    cpu: row.value,
                    time,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Rows are ordered time-descending, so the first one is the most
        // recent the historical tier holds. If it stops short of the
        // requested end the window extends past what has arrived there.
        let consult_future = match historical_rows.first() {
            None => true,
            Some(newest) => newest.time < query.end_ms,
        };

        let future_rows = if consult_future {
            let start_s = millis_to_seconds(query.start_ms);
            let end_s = millis_to_seconds(query.end_ms);
            self.future
                .query_range(
                    &self.config.future_table,
                    &query.identifier,
                    start_s,
                    end_s,
                )
                .await
                .map_err(Error::Store)?
                .into_iter()
                .map(|item| ReturnRow {
                    identifier: item.identifier,
                    cpu: item.value,
                    // Stored in seconds
                    time: item.time * 1000,
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(QueryResult {
            historical_rows,
            future_rows,
        })
    }
}

fn parse_row_time(raw: &str) -> Result<EpochMillis> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| {
            Error::Store(StoreError::MalformedRow(format!(
                "unparseable row time {raw:?}: {e}"
            )))
        })
}

fn millis_to_seconds(ms: EpochMillis) -> i64 {
    (ms as f64 / 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKeySpec, TableRef};
    use crate::stores::{InMemoryFutureStore, InMemoryTimeSeriesStore};
    use crate::types::{FutureItem, PastRecord, MEASURE_NAME};

    fn config() -> ServiceConfig {
        ServiceConfig::new(
            TableRef::new("tsdb", "samples"),
            "future",
            ApiKeySpec::Literal("secret".to_string()),
        )
    }

    fn coordinator(
        timeseries: Arc<InMemoryTimeSeriesStore>,
        future: Arc<InMemoryFutureStore>,
    ) -> QueryCoordinator {
        QueryCoordinator::new(
            config(),
            Arc::new(CredentialCache::new(
                ApiKeySpec::Literal("secret".to_string()),
                None,
            )),
            timeseries,
            future,
        )
    }

    fn query(identifier: &str, start_ms: i64, end_ms: i64) -> RangeQuery {
        RangeQuery {
            identifier: identifier.to_string(),
            start_ms,
            end_ms,
        }
    }

    async fn seed_past(store: &InMemoryTimeSeriesStore, identifier: &str, time_s: i64, value: &str) {
        store
            .write_records(
                &TableRef::new("tsdb", "samples"),
                &[PastRecord {
                    identifier: identifier.to_string(),
                    measure_name: MEASURE_NAME.to_string(),
                    measure_value: value.to_string(),
                    time: time_s,
                }],
            )
            .await
            .unwrap();
    }

    #[test]
    fn test_validation_rejects_missing_parameters() {
        assert!(matches!(
            RangeQuery::try_new(None, Some("1".into()), Some("2".into())),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            RangeQuery::try_new(Some("a".into()), None, Some("2".into())),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            RangeQuery::try_new(Some("a".into()), Some("nope".into()), Some("2".into())),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            RangeQuery::try_new(Some("a".into()), Some("5".into()), Some("2".into())),
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_authorize() {
        let c = coordinator(
            Arc::new(InMemoryTimeSeriesStore::new()),
            Arc::new(InMemoryFutureStore::new()),
        );
        assert!(c.authorize(Some("secret")).await.is_ok());
        assert!(matches!(
            c.authorize(Some("wrong")).await,
            Err(Error::Auth(_))
        ));
        assert!(matches!(c.authorize(None).await, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn test_empty_historical_triggers_future_query() {
        let future = Arc::new(InMemoryFutureStore::new());
        let c = coordinator(Arc::new(InMemoryTimeSeriesStore::new()), future.clone());

        let now_s = Utc::now().timestamp();
        let result = c
            .fetch_range_at(
                &query("11111", (now_s - 7200) * 1000, (now_s + 7200) * 1000),
                now_s * 1000,
            )
            .await
            .unwrap();

        assert!(result.historical_rows.is_empty());
        assert_eq!(future.query_count(), 1);
    }

    #[tokio::test]
    async fn test_covered_window_skips_future_query() {
        let timeseries = Arc::new(InMemoryTimeSeriesStore::new());
        let future = Arc::new(InMemoryFutureStore::new());

        // Most recent historical row lands exactly on the requested end
        let now_s = Utc::now().timestamp();
        seed_past(&timeseries, "11111", now_s, "42").await;

        let c = coordinator(timeseries, future.clone());
        let result = c
            .fetch_range_at(
                &query("11111", (now_s - 7200) * 1000, now_s * 1000),
                now_s * 1000,
            )
            .await
            .unwrap();

        assert_eq!(result.historical_rows.len(), 1);
        assert!(result.future_rows.is_empty());
        assert_eq!(future.query_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_historical_tail_triggers_future_query() {
        let timeseries = Arc::new(InMemoryTimeSeriesStore::new());
        let future = Arc::new(InMemoryFutureStore::new());

        let now_s = Utc::now().timestamp();
        seed_past(&timeseries, "11111", now_s - 3600, "42").await;
        future
            .batch_write(
                "future",
                &[FutureItem {
                    identifier: "11111".to_string(),
                    time: now_s + 3600,
                    value: "7".to_string(),
                    metadata: "Future".to_string(),
                    document: String::new(),
                    expiry: now_s + 86_400,
                }],
            )
            .await
            .unwrap();

        let c = coordinator(timeseries, future.clone());
        let result = c
            .fetch_range_at(
                &query("11111", (now_s - 7200) * 1000, (now_s + 7200) * 1000),
                now_s * 1000,
            )
            .await
            .unwrap();

        assert_eq!(future.query_count(), 1);
        assert_eq!(result.historical_rows.len(), 1);
        assert_eq!(result.historical_rows[0].cpu, "42");
        assert_eq!(result.future_rows.len(), 1);
        assert_eq!(result.future_rows[0].cpu, "7");
        // Stored seconds mapped back to milliseconds
        assert_eq!(result.future_rows[0].time, (now_s + 3600) * 1000);
    }

    #[tokio::test]
    async fn test_result_sets_stay_unmerged() {
        let timeseries = Arc::new(InMemoryTimeSeriesStore::new());
        let future = Arc::new(InMemoryFutureStore::new());

        let now_s = Utc::now().timestamp();
        // Same (identifier, time) present in both tiers
        seed_past(&timeseries, "11111", now_s - 60, "42").await;
        future
            .batch_write(
                "future",
                &[FutureItem {
                    identifier: "11111".to_string(),
                    time: now_s - 60,
                    value: "42".to_string(),
                    metadata: String::new(),
                    document: String::new(),
                    expiry: now_s + 86_400,
                }],
            )
            .await
            .unwrap();

        let c = coordinator(timeseries, future);
        let result = c
            .fetch_range_at(
                &query("11111", (now_s - 7200) * 1000, (now_s + 7200) * 1000),
                now_s * 1000,
            )
            .await
            .unwrap();

        // Both tiers report the row; nothing is deduplicated
        assert_eq!(result.historical_rows.len(), 1);
        assert_eq!(result.future_rows.len(), 1);
    }
}

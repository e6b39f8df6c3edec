//! Horizon TSDB HTTP Server
//!
//! Serves the two-tier time-series read API and, optionally, runs the
//! ingestion scheduler in-process against the in-memory engines.
//!
//! # Endpoints
//!
//! - `GET /timeSeries-data?startDate=<ms>&endDate=<ms>&identifier=<id>` -
//!   range query across both tiers; requires the `x-security-token` header
//! - `GET /health` - health check
//! - `GET /metrics` - plain-text counters
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `HORIZON_CONFIG` environment variable (path to TOML file)
//! 2. `./horizon.toml` in current directory
//! 3. Default configuration
//!
//! Store names and the API key come from the standard environment variables
//! (`TS_DB_NAME`, `TS_TABLE_NAME`, `FUTURE_TABLE`, `API_KEY` /
//! `API_KEY_SSM_ID`) unless the TOML file overrides them.
//!
//! # Example
//!
//! ```bash
//! TS_DB_NAME=tsdb TS_TABLE_NAME=samples FUTURE_TABLE=future API_KEY=secret ./server
//!
//! curl -H "x-security-token: secret" \
//!   "http://localhost:8080/timeSeries-data?startDate=0&endDate=2000000000000&identifier=11111"
//! ```

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use horizon_tsdb::{
    config::ServiceConfig,
    dispatch::{InMemoryChannel, StaticIdentifierSource},
    error::Error,
    ingest::{IngestScheduler, IngestionPipeline, SchedulerConfig},
    query::{QueryCoordinator, RangeQuery},
    source::{CredentialCache, SpoofSource},
    stores::{InMemoryFutureStore, InMemoryTimeSeriesStore},
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

// =============================================================================
// Server Configuration
// =============================================================================

/// Server configuration loaded from TOML or environment
#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_listen_addr")]
    listen_addr: String,

    /// Identifiers the scheduler ingests (empty = scheduler idle)
    #[serde(default)]
    identifiers: Vec<String>,

    /// Seconds between scheduler discovery runs
    #[serde(default = "default_scan_interval_secs")]
    scan_interval_secs: u64,

    /// Run the in-process ingestion scheduler
    #[serde(default = "default_true")]
    enable_scheduler: bool,

    /// Past-tier database name (overrides TS_DB_NAME)
    #[serde(default)]
    ts_database: Option<String>,

    /// Past-tier table name (overrides TS_TABLE_NAME)
    #[serde(default)]
    ts_table: Option<String>,

    /// Future-tier table name (overrides FUTURE_TABLE)
    #[serde(default)]
    future_table: Option<String>,

    /// Shared API key (overrides API_KEY)
    #[serde(default)]
    api_key: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_scan_interval_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            identifiers: Vec::new(),
            scan_interval_secs: default_scan_interval_secs(),
            enable_scheduler: true,
            ts_database: None,
            ts_table: None,
            future_table: None,
            api_key: None,
        }
    }
}

impl ServerConfig {
    /// Resolve the validated service configuration, file values first,
    /// environment second
    fn service_config(&self) -> Result<ServiceConfig, Error> {
        ServiceConfig::from_lookup(|name| {
            let from_file = match name {
                "TS_DB_NAME" => self.ts_database.clone(),
                "TS_TABLE_NAME" => self.ts_table.clone(),
                "FUTURE_TABLE" => self.future_table.clone(),
                "API_KEY" => self.api_key.clone(),
                _ => None,
            };
            from_file.or_else(|| std::env::var(name).ok())
        })
    }
}

/// Load configuration from file or environment
fn load_config() -> ServerConfig {
    if let Ok(path) = std::env::var("HORIZON_CONFIG") {
        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    info!(path = %path, "Loaded configuration from file");
                    return config;
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to parse config file, using defaults");
                }
            },
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to read config file, using defaults");
            }
        }
    }

    if let Ok(content) = std::fs::read_to_string("horizon.toml") {
        if let Ok(config) = toml::from_str(&content) {
            info!("Loaded configuration from horizon.toml");
            return config;
        }
    }

    info!("Using default configuration");
    ServerConfig::default()
}

// =============================================================================
// Application State
// =============================================================================

/// Shared application state
struct AppState {
    coordinator: QueryCoordinator,
    scheduler: Arc<IngestScheduler>,
}

// =============================================================================
// API Request/Response Types
// =============================================================================

/// Query parameters for the range endpoint, raw until validated
#[derive(Debug, Deserialize)]
struct TimeSeriesParams {
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
    identifier: Option<String>,
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Health response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

// =============================================================================
// API Handlers
// =============================================================================

/// Map an error kind to its HTTP status.
///
/// Client-caused failures stay in the 4xx range; store and source faults
/// surface as 502 instead of masquerading as client errors.
fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) | Error::Auth(_) | Error::Configuration(_) => StatusCode::BAD_REQUEST,
        Error::Store(_) | Error::Source(_) | Error::Dispatch(_) => StatusCode::BAD_GATEWAY,
    }
}

fn error_response(error: Error) -> (StatusCode, Json<ErrorResponse>) {
    (
        status_for(&error),
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

/// Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Range query across both tiers
async fn time_series_data(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<TimeSeriesParams>,
) -> impl IntoResponse {
    let token = headers
        .get("x-security-token")
        .and_then(|value| value.to_str().ok());
    if let Err(e) = state.coordinator.authorize(token).await {
        return error_response(e).into_response();
    }

    let query = match RangeQuery::try_new(params.identifier, params.start_date, params.end_date) {
        Ok(query) => query,
        Err(e) => return error_response(e).into_response(),
    };

    match state.coordinator.fetch_range(&query).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            tracing::error!(identifier = %query.identifier, error = %e, "Range query failed");
            error_response(e).into_response()
        }
    }
}

/// Plain-text counters
async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.scheduler.stats();
    let body = format!(
        "# HELP horizon_scheduler_runs_total Discovery runs completed\n\
         # TYPE horizon_scheduler_runs_total counter\n\
         horizon_scheduler_runs_total {}\n\
         # HELP horizon_batches_dispatched_total Batches dispatched\n\
         # TYPE horizon_batches_dispatched_total counter\n\
         horizon_batches_dispatched_total {}\n\
         # HELP horizon_batches_failed_total Batches whose processing failed\n\
         # TYPE horizon_batches_failed_total counter\n\
         horizon_batches_failed_total {}\n\
         # HELP horizon_identifiers_seen Identifiers seen in the latest run\n\
         # TYPE horizon_identifiers_seen gauge\n\
         horizon_identifiers_seen {}\n\
         # HELP horizon_records_written_total Records written to either tier\n\
         # TYPE horizon_records_written_total counter\n\
         horizon_records_written_total {}\n",
        stats.runs,
        stats.batches_dispatched,
        stats.batches_failed,
        stats.identifiers_seen,
        stats.records_written,
    );
    (StatusCode::OK, [("content-type", "text/plain")], body)
}

// =============================================================================
// Server Initialization
// =============================================================================

/// Build the router with all endpoints
fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/timeSeries-data", get(time_series_data))
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("horizon_tsdb=info".parse()?)
                .add_directive("server=info".parse()?),
        )
        .init();

    info!("Horizon TSDB server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = load_config();
    let service_config = config.service_config()?;
    info!("Listen address: {}", config.listen_addr);
    info!(
        "Past tier: {}.{}, future tier: {}",
        service_config.timeseries.database,
        service_config.timeseries.table,
        service_config.future_table
    );

    // In-memory engines back the single-process deployment; real store
    // clients implement the same traits and slot in here.
    let timeseries = Arc::new(InMemoryTimeSeriesStore::new());
    let future = Arc::new(InMemoryFutureStore::new());
    let credentials = Arc::new(CredentialCache::new(service_config.api_key.clone(), None));

    let pipeline = IngestionPipeline::builder()
        .with_config(service_config.clone())
        .with_source(SpoofSource::new())
        .with_credentials(credentials.clone())
        .with_timeseries_store(timeseries.clone())
        .with_future_store(future.clone())
        .build()?;

    let scheduler = Arc::new(IngestScheduler::new(
        SchedulerConfig {
            scan_interval: Duration::from_secs(config.scan_interval_secs),
        },
        Arc::new(StaticIdentifierSource::new(config.identifiers.clone())),
        Arc::new(InMemoryChannel::new()),
        Arc::new(pipeline),
    ));

    let (shutdown_tx, _) = broadcast::channel(1);
    let scheduler_task = if config.enable_scheduler {
        let scheduler = scheduler.clone();
        let rx = shutdown_tx.subscribe();
        info!(
            interval_secs = config.scan_interval_secs,
            identifiers = config.identifiers.len(),
            "Starting ingestion scheduler"
        );
        Some(tokio::spawn(async move { scheduler.run(rx).await }))
    } else {
        None
    };

    let coordinator = QueryCoordinator::new(service_config, credentials, timeseries, future);
    let state = Arc::new(AppState {
        coordinator,
        scheduler,
    });
    let app = build_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(());
    if let Some(task) = scheduler_task {
        let _ = task.await;
    }

    info!("Server shutdown complete");
    Ok(())
}

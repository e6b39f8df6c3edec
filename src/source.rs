//! Upstream data source and credential resolution
//!
//! The real upstream is out of scope; [`DataSource`] is the replaceable seam
//! and [`SpoofSource`] the stand-in that generates a plausible sample stream
//! straddling the ingestion instant. Credentials are resolved through an
//! explicitly owned [`CredentialCache`] rather than ambient process state.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;

use crate::config::ApiKeySpec;
use crate::error::{Error, Result, SourceError};
use crate::types::{EpochSeconds, Sample};

/// Sample cadence of the spoofed stream
const SPOOF_STEP_SECONDS: i64 = 5 * 60;

/// Spoofed stream spans this far either side of `now`
const SPOOF_SPAN_SECONDS: i64 = 24 * 60 * 60;

// ============================================================================
// Data source
// ============================================================================

/// Source of raw samples for one identifier
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch all currently available samples for `identifier`
    async fn fetch(
        &self,
        identifier: &str,
        api_key: &str,
    ) -> std::result::Result<Vec<Sample>, SourceError>;
}

/// Stub data source generating dummy samples.
///
/// Emits one sample every five minutes from 24 hours in the past to
/// 24 hours in the future, with a random 0..=100 value and metadata marking
/// which side of `now` the sample fell on at generation time.
#[derive(Debug, Default)]
pub struct SpoofSource;

impl SpoofSource {
    /// Create a new spoof source
    pub fn new() -> Self {
        Self
    }

    /// Generate the spoofed stream for one identifier at a given instant
    pub fn generate(identifier: &str, now: EpochSeconds) -> Vec<Sample> {
        let mut rng = rand::thread_rng();
        let mut samples = Vec::new();
        let mut current = now - SPOOF_SPAN_SECONDS;
        while current < now + SPOOF_SPAN_SECONDS {
            let metadata = if current < now { "Past" } else { "Future" };
            samples.push(Sample::new(
                identifier,
                current,
                rng.gen_range(0..=100u32).to_string(),
                metadata,
            ));
            current += SPOOF_STEP_SECONDS;
        }
        samples
    }
}

#[async_trait]
impl DataSource for SpoofSource {
    async fn fetch(
        &self,
        identifier: &str,
        _api_key: &str,
    ) -> std::result::Result<Vec<Sample>, SourceError> {
        let now = chrono::Utc::now().timestamp();
        Ok(Self::generate(identifier, now))
    }
}

// ============================================================================
// Parameter store
// ============================================================================

/// Read-only secret/parameter store
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Read a named parameter's string value
    async fn read_parameter(&self, name: &str) -> std::result::Result<String, SourceError>;
}

/// In-memory parameter store for tests and local runs
#[derive(Debug, Default)]
pub struct InMemoryParameterStore {
    values: Mutex<std::collections::HashMap<String, String>>,
    reads: Mutex<u64>,
}

impl InMemoryParameterStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter
    pub fn put(&self, name: impl Into<String>, value: impl Into<String>) {
        self.values.lock().insert(name.into(), value.into());
    }

    /// Number of read_parameter calls served
    pub fn read_count(&self) -> u64 {
        *self.reads.lock()
    }
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn read_parameter(&self, name: &str) -> std::result::Result<String, SourceError> {
        *self.reads.lock() += 1;
        self.values
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::Credential(format!("parameter {name} not found")))
    }
}

// ============================================================================
// Credential cache
// ============================================================================

/// Lazily-populated, explicitly owned API key cache.
///
/// The key is resolved on first use (from a literal value or through the
/// parameter store), then cached for the lifetime of this object.
/// [`CredentialCache::invalidate`] drops the cached value so the next
/// resolve fetches a fresh one.
pub struct CredentialCache {
    spec: ApiKeySpec,
    params: Option<Arc<dyn ParameterStore>>,
    cached: Mutex<Option<String>>,
}

impl CredentialCache {
    /// Create a cache for a literal key or a parameter-store lookup.
    ///
    /// `params` may be `None` when the spec is a literal; a parameter spec
    /// without a store fails at resolve time with a configuration error.
    pub fn new(spec: ApiKeySpec, params: Option<Arc<dyn ParameterStore>>) -> Self {
        Self {
            spec,
            params,
            cached: Mutex::new(None),
        }
    }

    /// Resolve the API key, fetching and caching it on first use
    pub async fn resolve(&self) -> Result<String> {
        if let Some(key) = self.cached.lock().clone() {
            return Ok(key);
        }

        let value = match &self.spec {
            ApiKeySpec::Literal(key) => key.clone(),
            ApiKeySpec::Parameter(name) => {
                let store = self.params.as_ref().ok_or_else(|| {
                    Error::Configuration(
                        "API key references the parameter store but none is configured"
                            .to_string(),
                    )
                })?;
                store.read_parameter(name).await.map_err(Error::Source)?
            }
        };

        if value.is_empty() {
            return Err(Error::Configuration(
                "resolved API key is empty".to_string(),
            ));
        }

        *self.cached.lock() = Some(value.clone());
        Ok(value)
    }

    /// Drop the cached key so the next resolve refetches it
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }
}

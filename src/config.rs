//! Service configuration
//!
//! All required settings are resolved and validated once at startup into a
//! single [`ServiceConfig`]; a missing setting raises a descriptive
//! configuration error before any store or source I/O is attempted.

use crate::error::{Error, Result};

/// Fully-qualified reference to a time-partitioned table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Database name
    pub database: String,
    /// Table name within the database
    pub table: String,
}

impl TableRef {
    /// Create a new table reference
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

/// Where the shared API key comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeySpec {
    /// Key supplied directly (e.g. via `API_KEY`)
    Literal(String),
    /// Key resolved from the parameter store under this name
    Parameter(String),
}

/// Validated configuration for the ingestion and query paths
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Past-tier database and table
    pub timeseries: TableRef,
    /// Future-tier table name
    pub future_table: String,
    /// Shared API key source
    pub api_key: ApiKeySpec,
}

impl ServiceConfig {
    /// Build a configuration from explicit values
    pub fn new(timeseries: TableRef, future_table: impl Into<String>, api_key: ApiKeySpec) -> Self {
        Self {
            timeseries,
            future_table: future_table.into(),
            api_key,
        }
    }

    /// Resolve configuration from process environment variables.
    ///
    /// Reads `TS_DB_NAME`, `TS_TABLE_NAME`, `FUTURE_TABLE` and either
    /// `API_KEY` or `API_KEY_SSM_ID`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary lookup function.
    ///
    /// Every required field is checked up front; the first absent one fails
    /// the whole resolution with the variable named in the error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database = require(&lookup, "TS_DB_NAME", "past tier database name")?;
        let table = require(&lookup, "TS_TABLE_NAME", "past tier table name")?;
        let future_table = require(&lookup, "FUTURE_TABLE", "future tier table name")?;

        let api_key = match lookup("API_KEY").filter(|v| !v.is_empty()) {
            Some(key) => ApiKeySpec::Literal(key),
            None => match lookup("API_KEY_SSM_ID").filter(|v| !v.is_empty()) {
                Some(name) => ApiKeySpec::Parameter(name),
                None => {
                    return Err(Error::Configuration(
                        "API key not provided in any way (API_KEY or API_KEY_SSM_ID)".to_string(),
                    ))
                }
            },
        };

        Ok(Self {
            timeseries: TableRef::new(database, table),
            future_table,
            api_key,
        })
    }
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    what: &str,
) -> Result<String> {
    lookup(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Configuration(format!("{what} missing ({name})")))
}

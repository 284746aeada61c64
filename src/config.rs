//! Encoder configuration.
//!
//! Values can be set directly or overlaid from the environment:
//! - `FHIR_TX_URL`: terminology server endpoint
//! - `FHIR_TX_BATCH_SIZE`: page size for expansion and closure batches
//! - `FHIR_TX_TIMEOUT_SECS`: per-request timeout

use crate::error::{EncoderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use tracing::warn;

/// Public Ontoserver instance used when no endpoint is given.
pub const DEFAULT_TX_URL: &str = "https://tx.ontoserver.csiro.au/fhir";

/// Default number of codes requested per page.
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

pub const ENV_TX_URL: &str = "FHIR_TX_URL";
pub const ENV_BATCH_SIZE: &str = "FHIR_TX_BATCH_SIZE";
pub const ENV_TIMEOUT_SECS: &str = "FHIR_TX_TIMEOUT_SECS";

/// Everything needed to build a [`TerminologyEncoder`](crate::TerminologyEncoder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EncoderConfig {
    /// ValueSet URI defining the codes to encode.
    pub scope: String,
    /// Terminology server endpoint
    #[serde(default = "EncoderConfig::default_tx_url")]
    pub tx_url: String,
    /// Properties to request and encode. `["*"]` requests every property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<String>>,
    /// Codes per expansion page and per closure batch.
    #[serde(default = "EncoderConfig::default_batch_size")]
    pub batch_size: usize,
    /// Per-request timeout; `None` keeps the transport default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl EncoderConfig {
    fn default_tx_url() -> String {
        DEFAULT_TX_URL.to_string()
    }

    fn default_batch_size() -> usize {
        DEFAULT_BATCH_SIZE
    }

    /// Create a config for the given scope with default settings.
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            tx_url: Self::default_tx_url(),
            properties: None,
            batch_size: Self::default_batch_size(),
            timeout_secs: None,
        }
    }

    /// Create a config for the given scope, taking overrides from environment variables.
    pub fn from_env(scope: impl Into<String>) -> Self {
        Self::new(scope).overlay(|key| std::env::var(key).ok())
    }

    /// Apply `FHIR_TX_*` overrides read through `lookup`.
    ///
    /// Unset variables keep the current value. Values that do not parse are
    /// logged and ignored.
    pub fn overlay<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_TX_URL) {
            self.tx_url = url;
        }
        if let Some(size) = parse_var(&lookup, ENV_BATCH_SIZE) {
            self.batch_size = size;
        }
        if let Some(secs) = parse_var(&lookup, ENV_TIMEOUT_SECS) {
            self.timeout_secs = Some(secs);
        }
        self
    }

    pub fn with_tx_url(mut self, tx_url: impl Into<String>) -> Self {
        self.tx_url = tx_url.into();
        self
    }

    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.scope.trim().is_empty() {
            return Err(EncoderError::Config("scope cannot be empty".to_string()));
        }
        if self.tx_url.trim().is_empty() {
            return Err(EncoderError::Config("tx_url cannot be empty".to_string()));
        }
        if self.batch_size == 0 {
            return Err(EncoderError::Config("batch_size must be > 0".to_string()));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "ignoring unparsable environment override");
            None
        }
    }
}

//! Terminology server access.
//!
//! [`TerminologyClient`] is the seam between the encoder and the server. The
//! encoder only needs two operations: paging through a ValueSet expansion and
//! posting `$closure` requests. [`HttpTerminologyClient`] speaks FHIR REST over
//! blocking HTTP; [`OfflineTerminology`](crate::offline::OfflineTerminology)
//! answers from memory.

use crate::config::EncoderConfig;
use crate::error::{EncoderError, Result, ServiceError};
use crate::fhir::{ConceptMap, Parameters, ValueSet, FHIR_JSON};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// One `$expand` page request.
#[derive(Debug, Clone, Copy)]
pub struct ExpandRequest<'a> {
    /// ValueSet URI
    pub url: &'a str,
    pub count: usize,
    pub offset: usize,
    /// Property names to include in the expansion.
    pub properties: &'a [String],
}

impl ExpandRequest<'_> {
    /// Query string pairs, with one `property` entry per requested property.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("url", self.url.to_string()),
            ("count", self.count.to_string()),
            ("offset", self.offset.to_string()),
        ];
        query.extend(self.properties.iter().map(|p| ("property", p.clone())));
        query
    }
}

/// Operations the encoder needs from a terminology server.
pub trait TerminologyClient {
    /// Fetch one page of a ValueSet expansion.
    fn expand(&self, request: &ExpandRequest<'_>) -> std::result::Result<ValueSet, ServiceError>;

    /// Post a `$closure` request and return the resulting concept map.
    fn closure(&self, parameters: &Parameters) -> std::result::Result<ConceptMap, ServiceError>;
}

/// FHIR REST client over blocking HTTP.
pub struct HttpTerminologyClient {
    base_url: String,
    http: Client,
}

impl HttpTerminologyClient {
    /// Create a client for the endpoint and timeout in `config`.
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| EncoderError::Config(e.to_string()))?;

        Ok(Self {
            base_url: config.tx_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Endpoint without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn expand_url(&self) -> String {
        format!("{}/ValueSet/$expand", self.base_url)
    }

    fn closure_url(&self) -> String {
        format!("{}/$closure", self.base_url)
    }
}

impl TerminologyClient for HttpTerminologyClient {
    fn expand(&self, request: &ExpandRequest<'_>) -> std::result::Result<ValueSet, ServiceError> {
        let url = self.expand_url();
        let response = self
            .http
            .get(&url)
            .query(&request.query())
            .header(ACCEPT, FHIR_JSON)
            .send()?;
        decode(response, &url)
    }

    fn closure(&self, parameters: &Parameters) -> std::result::Result<ConceptMap, ServiceError> {
        let url = self.closure_url();
        let body = serde_json::to_vec(parameters)
            .map_err(|e| ServiceError::Malformed(format!("cannot encode request: {}", e)))?;
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, FHIR_JSON)
            .header(ACCEPT, FHIR_JSON)
            .body(body)
            .send()?;
        decode(response, &url)
    }
}

/// Reject non-success statuses, then parse the body as `T`.
fn decode<T: DeserializeOwned>(response: Response, url: &str) -> std::result::Result<T, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        // The body is usually an OperationOutcome explaining the failure.
        let body = response.text().unwrap_or_else(|e| {
            debug!(error = %e, url, "failed to read error response body");
            String::new()
        });
        return Err(ServiceError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }
    let bytes = response.bytes()?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::Malformed(format!("{}: {}", url, e)))
}

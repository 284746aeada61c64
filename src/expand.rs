//! Scope expansion: page through a ValueSet and collect its codes.

use crate::client::{ExpandRequest, TerminologyClient};
use crate::error::{EncoderError, Result};
use crate::fhir::Coding;
use crate::properties::{self, Attributes};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Result of expanding a scope.
#[derive(Clone, Debug, Default)]
pub struct ScopeExpansion {
    /// Distinct codes in order of first appearance.
    pub codes: Vec<String>,
    /// Display text per code, aligned with `codes`.
    pub displays: Vec<Option<String>>,
    /// Flattened attributes per code, aligned with `codes`. `None` when no
    /// properties were requested.
    pub attributes: Option<Vec<Attributes>>,
    /// Codings exactly as paged by the server, one entry per request.
    pub batches: Vec<Vec<Coding>>,
}

impl ScopeExpansion {
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Pages through a scope with a fixed batch size.
pub struct ScopeExpander<'a, C: TerminologyClient + ?Sized> {
    client: &'a C,
    batch_size: usize,
    properties: Option<&'a [String]>,
}

impl<'a, C: TerminologyClient + ?Sized> ScopeExpander<'a, C> {
    /// A zero `batch_size` is rejected by [`expand`](Self::expand).
    pub fn new(client: &'a C, batch_size: usize) -> Self {
        Self {
            client,
            batch_size,
            properties: None,
        }
    }

    /// Request these properties with every page and collect them as attributes.
    pub fn with_properties(mut self, properties: Option<&'a [String]>) -> Self {
        self.properties = properties;
        self
    }

    /// Expand `scope`.
    ///
    /// Stepping stops once `offset` passes the `total` reported by the most
    /// recent page. Empty pages are recorded as empty batches.
    pub fn expand(&self, scope: &str) -> Result<ScopeExpansion> {
        if self.batch_size == 0 {
            return Err(EncoderError::Config("batch_size must be > 0".to_string()));
        }
        let mut expansion = ScopeExpansion {
            attributes: self.properties.map(|_| Vec::new()),
            ..ScopeExpansion::default()
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut offset = 0;
        let mut total = 0;

        while offset <= total {
            let request = ExpandRequest {
                url: scope,
                count: self.batch_size,
                offset,
                properties: self.properties.unwrap_or(&[]),
            };
            let page = self.client.expand(&request)?.expansion;
            total = page.total;
            info!(
                items = page.contains.len(),
                offset,
                total,
                "expanding"
            );

            for coding in &page.contains {
                if !seen.insert(coding.code.clone()) {
                    warn!(code = %coding.code, "duplicate code in expansion, keeping first");
                    continue;
                }
                expansion.codes.push(coding.code.clone());
                expansion.displays.push(coding.display.clone());
                if let Some(attrs) = expansion.attributes.as_mut() {
                    attrs.push(properties::attributes(coding));
                }
            }
            expansion.batches.push(page.contains);

            offset += self.batch_size;
        }

        debug!(
            codes = expansion.codes.len(),
            batches = expansion.batches.len(),
            "expansion complete"
        );
        Ok(expansion)
    }
}

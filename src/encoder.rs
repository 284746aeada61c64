//! Encoder: terminology codes to sparse feature rows.
//!
//! Building a [`TerminologyEncoder`] runs one pass over the scope:
//!
//! 1. Expand the ValueSet page by page, keeping the pages as batches.
//! 2. Index the codes and start from a one-hot relation block.
//! 3. Replay the batches through a closure session, marking each
//!    `(source, target)` pair in the relation block.
//! 4. Vectorize the requested properties, if any.
//! 5. Freeze everything into a CSR matrix.
//!
//! Any failure aborts the build; there is no partially built encoder.

use crate::client::{HttpTerminologyClient, TerminologyClient};
use crate::closure::ClosureSession;
use crate::config::EncoderConfig;
use crate::error::{EncoderError, Result};
use crate::expand::{ScopeExpander, ScopeExpansion};
use crate::fhir::Coding;
use crate::matrix::{CodeIndex, FeatureMatrix, RelationBlock};
use crate::properties::Attributes;
use crate::vectorize::DictVectorizer;
use sprs::CsVecView;
use tracing::info;

/// Encodes codes into vectors describing their place in the terminology.
///
/// Row `i` of the matrix belongs to code `i`. Column `j < N` is set when code
/// `i` is subsumed by code `j` (always including `i == j`); the remaining
/// columns hold vectorized property values.
#[derive(Clone, Debug)]
pub struct TerminologyEncoder {
    pub(crate) index: CodeIndex,
    pub(crate) matrix: FeatureMatrix,
    displays: Vec<Option<String>>,
    attributes: Option<Vec<Attributes>>,
    session: String,
}

impl TerminologyEncoder {
    /// Build an encoder against the HTTP terminology server in `config`.
    pub fn new(config: &EncoderConfig) -> Result<Self> {
        config.validate()?;
        let client = HttpTerminologyClient::new(config)?;
        Self::with_client(&client, config)
    }

    /// Build an encoder using any terminology client.
    pub fn with_client<C: TerminologyClient + ?Sized>(
        client: &C,
        config: &EncoderConfig,
    ) -> Result<Self> {
        config.validate()?;

        info!(scope = %config.scope, "expanding value set");
        let expansion = ScopeExpander::new(client, config.batch_size)
            .with_properties(config.properties.as_deref())
            .expand(&config.scope)?;
        info!(codes = expansion.len(), "expansion complete");

        let ScopeExpansion {
            codes,
            displays,
            attributes,
            batches,
        } = expansion;

        let index = CodeIndex::from_codes(codes);
        let mut relations = RelationBlock::identity(index.len());
        info!(items = index.len(), "one-hot encoding created");

        let session = Self::apply_closure(client, &index, &mut relations, &batches)?;
        info!(rows = relations.len(), nnz = relations.nnz(), "subsumption encoding complete");

        let attribute_block = attributes
            .as_deref()
            .map(|attrs| DictVectorizer::new().fit_transform(attrs));
        if let Some(block) = &attribute_block {
            info!(features = block.n_cols(), "properties encoded");
        }

        let matrix = FeatureMatrix::assemble(&index, relations, attribute_block)?;
        let (rows, cols) = matrix.shape();
        info!(rows, cols, nnz = matrix.nnz(), "encoding complete");

        Ok(Self {
            index,
            matrix,
            displays,
            attributes,
            session,
        })
    }

    /// Feed each batch through one closure session, in expansion order.
    fn apply_closure<C: TerminologyClient + ?Sized>(
        client: &C,
        index: &CodeIndex,
        relations: &mut RelationBlock,
        batches: &[Vec<Coding>],
    ) -> Result<String> {
        let mut closure = ClosureSession::open(client)?;
        let num_batches = batches.len();

        for (i, batch) in batches.iter().enumerate() {
            let pairs = closure.update(batch)?;
            let mut added = 0;
            for pair in &pairs {
                if relations.insert(index, pair)? {
                    added += 1;
                }
            }
            info!(
                batch = i + 1,
                of = num_batches,
                items = batch.len(),
                pairs = pairs.len(),
                added,
                "closure batch applied"
            );
        }

        Ok(closure.name().to_string())
    }

    /// Codes in row order.
    pub fn codes(&self) -> &[String] {
        self.index.codes()
    }

    /// Display text per code, in row order.
    pub fn displays(&self) -> &[Option<String>] {
        &self.displays
    }

    /// Flattened properties per code, when properties were requested.
    pub fn attributes(&self) -> Option<&[Attributes]> {
        self.attributes.as_deref()
    }

    /// Column labels: codes, then attribute features.
    pub fn feature_names(&self) -> &[String] {
        self.matrix.feature_names()
    }

    pub fn index(&self) -> &CodeIndex {
        &self.index
    }

    pub fn matrix(&self) -> &FeatureMatrix {
        &self.matrix
    }

    /// Name of the closure table built on the server.
    pub fn session(&self) -> &str {
        &self.session
    }

    /// `(codes, features)`
    pub fn shape(&self) -> (usize, usize) {
        self.matrix.shape()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Encoded row for a single code.
    pub fn row(&self, code: &str) -> Result<CsVecView<'_, f64>> {
        let position = self.index.position(code)?;
        self.matrix
            .row(position)
            .ok_or_else(|| EncoderError::UnknownCode(code.to_string()))
    }
}

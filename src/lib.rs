//! # fhir-tx-encoder: terminology-aware feature encoding
//!
//! Encodes FHIR terminology codes into sparse vectors for machine learning.
//! Beyond one-hot identity, each code's row records every code that subsumes
//! it, as computed by a FHIR terminology server's `$closure` operation, and
//! optionally its properties.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fhir_tx_encoder::{EncoderConfig, TerminologyEncoder};
//!
//! let config = EncoderConfig::new("http://snomed.info/sct?fhir_vs=isa/404684003")
//!     .with_properties(["inactive"])
//!     .with_batch_size(10_000);
//! let encoder = TerminologyEncoder::new(&config)?;
//!
//! // One row per code, in input order
//! let rows = encoder.transform_column(["73211009", "44054006"])?;
//! println!("{} x {}", rows.rows(), rows.cols());
//! # Ok::<(), fhir_tx_encoder::EncoderError>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Scope**: a ValueSet URI; its expansion fixes the code index
//! - **Closure**: a named table on the server, grown batch by batch, that
//!   reports `(source, target)` pairs where source is subsumed by target
//! - **Relation block**: `N × N`, cell `(i, j)` set when code `i` is subsumed by code `j`
//! - **Attribute block**: dictionary-vectorized properties, keyed by dotted path
//! - **Lookup**: `transform_column` / `transform` gather precomputed rows

pub mod client;
pub mod closure;
pub mod config;
pub mod encoder;
pub mod error;
pub mod expand;
pub mod fhir;
pub mod matrix;
pub mod offline;
pub mod properties;
pub mod transform;
pub mod vectorize;

// Re-exports for convenience
pub use client::{ExpandRequest, HttpTerminologyClient, TerminologyClient};
pub use closure::{ClosureSession, SubsumptionPair};
pub use config::EncoderConfig;
pub use encoder::TerminologyEncoder;
pub use error::{EncoderError, Result, ServiceError};
pub use expand::{ScopeExpander, ScopeExpansion};
pub use fhir::Coding;
pub use matrix::{CodeIndex, FeatureMatrix, RelationBlock};
pub use offline::OfflineTerminology;
pub use properties::{AttributeValue, Attributes, Property};
pub use transform::Transformer;
pub use vectorize::{AttributeBlock, DictVectorizer};

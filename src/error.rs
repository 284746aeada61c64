//! Error types for the encoder.

use thiserror::Error;

/// Failures talking to the terminology server.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request never produced a response (connection, TLS, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("terminology server returned {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// The response body was not the resource shape we expected.
    #[error("malformed terminology response: {0}")]
    Malformed(String),
}

/// Encoder error types.
#[derive(Error, Debug)]
pub enum EncoderError {
    /// Terminology server failure; aborts the build.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A code outside the fixed code index was referenced.
    #[error("Encountered code not in scope: {0}")]
    UnknownCode(String),

    /// Transformer input had the wrong dimensionality or arity.
    #[error("Shape error: {0}")]
    Shape(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for encoder operations.
pub type Result<T> = std::result::Result<T, EncoderError>;

//! Error types for the openclose backtester.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the openclose backtester.
///
/// A run aborts on the first error it sees. A proportional order whose price or
/// portfolio value is NaN is not an error: the broker skips the trade instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Requested data cannot be served (unsupported asset class or frequency,
    /// non-positive bar count, missing history).
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// A strategy derived a non-finite sizing weight from degenerate history.
    #[error("Degenerate computation: {0}")]
    ComputationDegenerate(String),

    /// Insufficient data for computation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a data unavailable error.
    pub fn data_unavailable(msg: impl Into<String>) -> Self {
        Error::DataUnavailable(msg.into())
    }

    /// Create a degenerate computation error.
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Error::ComputationDegenerate(msg.into())
    }

    /// Create an insufficient data error.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Error::InsufficientData(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether this error came from missing or unsupported data.
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, Error::DataUnavailable(_))
    }

    /// Whether this error came from a strategy's degenerate sizing.
    pub fn is_degenerate(&self) -> bool {
        matches!(self, Error::ComputationDegenerate(_))
    }
}

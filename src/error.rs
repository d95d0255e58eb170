//! Error types for the geoenrich library

use crate::mmdb::MmdbError;
use thiserror::Error;

/// Result type alias for enrichment operations
pub type Result<T> = std::result::Result<T, EnrichError>;

/// Main error type for enrichment operations
///
/// Errors raised while processing a single record are collected per record
/// and never abort a batch. Only database open and configuration failures
/// surface from constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichError {
    /// The source field does not hold a parseable IP address
    #[error("Invalid IP address: {0:?}")]
    Parse(String),

    /// The address is valid but has no database entry
    #[error("No database entry for {0}")]
    LookupMiss(String),

    /// A key on the path is absent
    #[error("Missing key: {0}")]
    MissingKey(String),

    /// A level on the path exists but is not a nested map
    #[error("Value at {0} is not a map")]
    WrongShape(String),

    /// The source field exists but is not a string
    #[error("Field {0} is not a string")]
    NotString(String),

    /// The data record for a resolved address could not be decoded
    #[error("Record decode error: {0}")]
    Decode(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Processing a record panicked; the record may be partially enriched
    #[error("Record processing panicked: {0}")]
    Panicked(String),

    /// Database format errors
    #[error(transparent)]
    Format(#[from] MmdbError),
}

impl From<serde_json::Error> for EnrichError {
    fn from(err: serde_json::Error) -> Self {
        EnrichError::Config(err.to_string())
    }
}

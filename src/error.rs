//! Error types shared across the crate.

use crate::dedupe::Dimension;
use thiserror::Error;

/// A specialized Result type for library reading and writing.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Errors raised while reading or writing a reference library.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    InvalidFormat(String),

    #[error("Unknown library format: {0}")]
    UnknownFormat(String),

    #[error("Invalid field value: {field} - {message}")]
    InvalidFieldValue { field: String, message: String },

    #[error("Write error: {0}")]
    Write(String),
}

#[cfg(feature = "csv")]
impl From<::csv::Error> for LibraryError {
    fn from(err: ::csv::Error) -> Self {
        LibraryError::InvalidFormat(err.to_string())
    }
}

#[cfg(feature = "xml")]
impl From<quick_xml::Error> for LibraryError {
    fn from(err: quick_xml::Error) -> Self {
        LibraryError::InvalidFormat(err.to_string())
    }
}

#[cfg(feature = "xml")]
impl From<quick_xml::events::attributes::AttrError> for LibraryError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        LibraryError::InvalidFormat(err.to_string())
    }
}

impl From<serde_json::Error> for LibraryError {
    fn from(err: serde_json::Error) -> Self {
        LibraryError::InvalidFormat(err.to_string())
    }
}

/// Fatal errors detected before a deduplication run starts.
///
/// No events are produced when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DedupeError {
    #[error("At least two references are required for deduplication, got {0}")]
    TooFewRecords(usize),

    #[error("Weight for {dimension} must be within [0, 1], got {value}")]
    InvalidWeight { dimension: Dimension, value: f64 },

    #[error("Threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Unknown resolution policy: {0}")]
    UnknownPolicy(String),

    #[error("Unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// A recoverable failure of one scorer on one candidate pair.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{dimension} scorer failed: {message}")]
pub struct ScorerError {
    pub dimension: Dimension,
    pub message: String,
}

impl ScorerError {
    pub fn new(dimension: Dimension, message: impl Into<String>) -> Self {
        Self {
            dimension,
            message: message.into(),
        }
    }
}

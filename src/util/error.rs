//! Error types for the streaming engine.

use thiserror::Error;

/// Main error type for schema streaming operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Raw sample data is malformed or the archive read failed
    #[error("Decode failed for '{property}' at sample {index}: {reason}")]
    Decode {
        property: String,
        index: usize,
        reason: String,
    },

    /// Invalid time sampling or schema setup
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Caller broke the update/wait protocol
    #[error("Usage error: {0}")]
    Usage(String),

    /// A read or cook stage panicked on the worker
    #[error("Async job panicked: {0}")]
    JobPanicked(String),

    /// Property not found by name
    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    /// Property index out of bounds
    #[error("Property index {index} out of bounds (count: {count})")]
    PropertyOutOfBounds { index: usize, count: usize },

    /// Two properties with the same name in one store
    #[error("Duplicate property: {0}")]
    DuplicateProperty(String),

    /// Sample index out of bounds
    #[error("Sample index {index} out of bounds (count: {count})")]
    SampleOutOfBounds { index: usize, count: usize },

    /// Type mismatch when reinterpreting raw bytes
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a decode error for a property sample.
    pub fn decode(property: impl Into<String>, index: usize, reason: impl Into<String>) -> Self {
        Self::Decode {
            property: property.into(),
            index,
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a usage error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Check if this is a decode failure.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Check if this is a protocol violation by the caller.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}

/// Result type alias for streaming operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the tag relationship core.
//!
//! Malformed or cyclic relationship data is never an error here: resolvers drop
//! offending pairs locally. Errors are reserved for things a caller can act on,
//! such as an unknown service or a failed store read.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the tag relationship core.
#[derive(Debug, Error)]
pub enum TagRelError {
    // Lookup errors
    #[error("Service not found: {service}")]
    ServiceNotFound { service: String },

    // Store errors
    #[error("Store read failed: {message}")]
    Store {
        message: String,
        /// Whether a later attempt may succeed
        retryable: bool,
    },

    #[error("Operation was cancelled")]
    Cancelled,

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for tag relationship operations.
pub type Result<T> = std::result::Result<T, TagRelError>;

impl From<std::io::Error> for TagRelError {
    fn from(err: std::io::Error) -> Self {
        TagRelError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for TagRelError {
    fn from(err: serde_json::Error) -> Self {
        TagRelError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl TagRelError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        TagRelError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a store error that a later rebuild may recover from.
    pub fn store(message: impl Into<String>) -> Self {
        TagRelError::Store {
            message: message.into(),
            retryable: true,
        }
    }

    /// Create the error for a service identifier nobody registered.
    pub fn service_not_found(service: impl std::fmt::Display) -> Self {
        TagRelError::ServiceNotFound {
            service: service.to_string(),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Store read failure
    /// - -32002: Service not found
    /// - -32004: Cancelled
    /// - -32005: Configuration error
    ///
    /// Invalid parameters use the standard -32602.
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            TagRelError::Store { .. } => -32000,
            TagRelError::ServiceNotFound { .. } => -32002,
            TagRelError::Cancelled => -32004,
            TagRelError::Config { .. } => -32005,
            TagRelError::InvalidParams { .. } | TagRelError::Json { .. } => -32602,
            _ => -32603,
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TagRelError::Store { retryable: true, .. })
    }
}

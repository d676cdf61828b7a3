//! Error types for neo4j-snapshot
//!
//! This module defines the error hierarchy for the whole replication pipeline.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for neo4j-snapshot
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Source (graph database) Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Source query failed [{code}]: {message}")]
    Source { code: String, message: String },

    #[error("Malformed source data: {message}")]
    MalformedData { message: String },

    // ============================================================================
    // Warehouse Errors
    // ============================================================================
    #[error("Warehouse error: {0}")]
    Warehouse(#[from] duckdb::Error),

    #[error("Warehouse operation failed: {message}")]
    WarehouseOperation { message: String },

    #[error("Stage storage error: {0}")]
    Stage(#[from] object_store::Error),

    #[error("Load mismatch: staged {expected} records but {loaded} rows landed")]
    LoadMismatch { expected: usize, loaded: usize },

    // ============================================================================
    // Retry Errors
    // ============================================================================
    #[error("Operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Operation '{operation}' failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a source query error from a Neo4j status code
    pub fn source(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a malformed data error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedData {
            message: message.into(),
        }
    }

    /// Create a warehouse operation error
    pub fn warehouse(message: impl Into<String>) -> Self {
        Self::WarehouseOperation {
            message: message.into(),
        }
    }

    /// Check if this error is a transient connectivity failure
    ///
    /// Only transient errors are eligible for retry. Configuration, malformed
    /// data and query errors propagate immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.is_request()
                    || e.is_body()
                    || (e.is_decode() && has_transient_io_source(e))
            }
            Error::HttpStatus { status, .. } => is_transient_status(*status),
            Error::Source { code, .. } => is_transient_code(code),
            Error::Timeout { .. } => true,
            Error::Io(e) => is_transient_io(e.kind()),
            _ => false,
        }
    }
}

/// Check if an HTTP status code signals temporary unavailability
fn is_transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 502 | 503 | 504)
}

/// Neo4j classifies retryable failures under `Neo.TransientError.*`
fn is_transient_code(code: &str) -> bool {
    code.starts_with("Neo.TransientError.")
}

fn is_transient_io(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind;
    matches!(
        kind,
        ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
            | ErrorKind::UnexpectedEof
    )
}

/// Walk the source chain for an I/O error that signals a dropped connection
///
/// A body cut short mid-read surfaces from reqwest as a decode error wrapping
/// hyper's `IncompleteBody`, which in turn wraps an `UnexpectedEof`.
fn has_transient_io_source(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if is_transient_io(io.kind()) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

/// Result type alias for neo4j-snapshot
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

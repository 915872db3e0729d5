//! Typed errors for the comment parser library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell a
//! locator miss from a session fault, and a store failure from an API error.

use thiserror::Error;

/// Errors raised while reading or writing the comment table.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing file could not be read, written or renamed
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Table contents are not valid JSON for the comment schema
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Faults reported by a browser session.
///
/// A locator that simply does not match is not a fault; session methods
/// report that as `Ok(None)` or an empty list.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport to the driver failed
    #[error("driver transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Driver answered with a protocol error
    #[error("driver error {error}: {message}")]
    Protocol { error: String, message: String },

    /// Driver response did not have the expected shape
    #[error("unexpected driver response: {0}")]
    UnexpectedResponse(String),

    /// Session could not be created
    #[error("session setup failed: {0}")]
    Setup(String),

    /// Session was already closed
    #[error("session closed")]
    Closed,
}

/// Errors that end a harvest early.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Browser session fault during navigation, scrolling or scanning
    #[error("browser session fault: {0}")]
    Session(#[from] SessionError),
}

/// Translation capability failures. Always absorbed by the harvester.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// HTTP request to the translation service failed
    #[error("translation HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Service answered without a usable result
    #[error("translation service returned no result: {0}")]
    EmptyResult(String),
}

/// Errors from the REST platform clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Platform API answered with an error payload
    #[error("{platform} API error: {message}")]
    Api { platform: &'static str, message: String },

    /// Response body did not match the expected shape
    #[error("unexpected {platform} response: {reason}")]
    Decode { platform: &'static str, reason: String },
}

/// Result type alias for store internals.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for browser session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Result type alias for harvest steps.
pub type HarvestResult<T> = std::result::Result<T, HarvestError>;

/// Result type alias for REST client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

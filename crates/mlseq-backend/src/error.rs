//! Error types for the HTTP backend.

use thiserror::Error;

/// Result type for backend construction.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised while setting up the client.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// A configured endpoint is not an absolute http(s) URL.
    #[error("invalid backend URL '{0}'")]
    InvalidUrl(String),
}

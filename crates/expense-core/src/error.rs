//! Error types for port operations.

use thiserror::Error;

/// Errors returned by external collaborators (AI, OCR, transports, storage).
#[derive(Debug, Error)]
pub enum PortError {
    /// The collaborator is temporarily unavailable.
    #[error("port unavailable: {0}")]
    Unavailable(String),

    /// The collaborator answered with something we could not use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The collaborator is misconfigured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The provider rejected the call because of rate limiting.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Network or I/O failure while talking to the collaborator.
    #[error("transport error: {0}")]
    Transport(String),
}

impl PortError {
    /// Whether the provider asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PortError::RateLimited(_))
    }
}

//! Error types for the model client.

use expense_core::PortError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiClientError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The model answered, but not with what we asked for.
    #[error("unusable model output: {0}")]
    Parse(String),
}

impl From<AiClientError> for PortError {
    fn from(err: AiClientError) -> Self {
        match err {
            AiClientError::Configuration(msg) => PortError::Configuration(msg),
            AiClientError::Network(e) if e.is_timeout() || e.is_connect() => PortError::Unavailable(e.to_string()),
            AiClientError::Network(e) => PortError::Transport(e.to_string()),
            AiClientError::Api { status: 429, message } => PortError::RateLimited(message),
            AiClientError::Api { status, message } if status >= 500 => {
                PortError::Unavailable(format!("API error ({}): {}", status, message))
            }
            AiClientError::Api { status, message } => {
                PortError::InvalidResponse(format!("API error ({}): {}", status, message))
            }
            AiClientError::Parse(msg) => PortError::InvalidResponse(msg),
        }
    }
}

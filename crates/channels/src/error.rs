//! Error types for channel transports.

use expense_core::PortError;
use thiserror::Error;

/// Errors that can occur when talking to a messaging provider.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered with a non-success status.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// The provider asked us to slow down.
    #[error("Rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<ChannelError> for PortError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Http(e) if e.is_timeout() || e.is_connect() => PortError::Unavailable(e.to_string()),
            ChannelError::Http(e) => PortError::Transport(e.to_string()),
            ChannelError::Json(e) => PortError::InvalidResponse(e.to_string()),
            ChannelError::Api { status: 429, body } => PortError::RateLimited(body),
            ChannelError::Api { status, body } if status >= 500 => {
                PortError::Unavailable(format!("status {}: {}", status, body))
            }
            ChannelError::Api { status, body } => PortError::InvalidResponse(format!("status {}: {}", status, body)),
            err @ ChannelError::RateLimited { .. } => PortError::RateLimited(err.to_string()),
            ChannelError::Config(msg) => PortError::Configuration(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_mapping() {
        let limited: PortError = ChannelError::RateLimited { retry_after: Some(3) }.into();
        assert!(limited.is_rate_limited());

        let too_many: PortError = ChannelError::Api {
            status: 429,
            body: "Too Many Requests".to_string(),
        }
        .into();
        assert!(too_many.is_rate_limited());

        let bad: PortError = ChannelError::Api {
            status: 400,
            body: "bad chat".to_string(),
        }
        .into();
        assert!(matches!(bad, PortError::InvalidResponse(_)));

        let down: PortError = ChannelError::Api {
            status: 503,
            body: String::new(),
        }
        .into();
        assert!(matches!(down, PortError::Unavailable(_)));

        let config: PortError = ChannelError::Config("missing token".to_string()).into();
        assert!(matches!(config, PortError::Configuration(_)));
    }
}

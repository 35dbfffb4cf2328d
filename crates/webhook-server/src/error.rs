//! Error types for the webhook server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pipeline::PipelineError;
use thiserror::Error;

/// Errors a webhook handler can answer with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Signature or secret token did not verify.
    #[error("Unauthorized")]
    Unauthorized,

    /// The body could not be read as a provider payload.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// No customer is mapped to the sender or recipient.
    #[error("Customer not found")]
    CustomerNotFound,

    /// The request was understood but cannot be acted on.
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// The endpoint or transport is not available.
    #[error("{0}")]
    NotImplemented(&'static str),

    /// Ledger or lookup failure.
    #[error("Database error: {0}")]
    Database(#[from] database::DatabaseError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::CustomerNotFound => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Pipeline(err) => match err {
                PipelineError::FeatureBlocked { .. } => StatusCode::PAYMENT_REQUIRED,
                PipelineError::ChannelDisabled { .. } | PipelineError::ChannelSettingMissing { .. } => {
                    StatusCode::FORBIDDEN
                }
                PipelineError::InvalidTransaction(_) => StatusCode::UNPROCESSABLE_ENTITY,
                e if e.is_rate_limited() => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Stable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::CustomerNotFound => "CUSTOMER_NOT_FOUND",
            ApiError::Unprocessable(_) => "UNPROCESSABLE",
            ApiError::NotImplemented(_) => "NOT_IMPLEMENTED",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Pipeline(err) => err.error_code(),
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Pipeline(PipelineError::FeatureBlocked { .. }) => "Payment Required".to_string(),
            ApiError::Pipeline(PipelineError::ChannelDisabled { .. }) => "Channel disabled".to_string(),
            ApiError::Pipeline(PipelineError::ChannelSettingMissing { .. }) => "Channel setting missing".to_string(),
            ApiError::Pipeline(e) if e.is_rate_limited() => "Too Many Requests".to_string(),
            ApiError::Pipeline(PipelineError::InvalidTransaction(rejection)) => rejection.to_string(),
            ApiError::Database(_) | ApiError::Pipeline(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            tracing::error!(code = self.code(), error = %self, "webhook.request_failed");
        }

        let body = serde_json::json!({
            "error": self.public_message(),
            "code": self.code(),
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

//! Route handlers for the webhook server.

pub mod email;
pub mod health;
pub mod instagram;
pub mod telegram;
pub mod whatsapp;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Header carrying a caller-supplied correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/webhooks/whatsapp", post(whatsapp::whatsapp_webhook))
        .route("/webhooks/telegram", post(telegram::telegram_webhook))
        .route("/webhooks/instagram", post(instagram::instagram_webhook))
        .route("/inbound/email", post(email::inbound_email))
}

/// Correlation id for logs and the ledger.
pub(crate) fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

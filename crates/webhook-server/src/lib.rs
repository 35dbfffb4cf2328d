//! HTTP surface of gastos.
//!
//! Routes:
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET | `/health` | liveness |
//! | POST | `/webhooks/whatsapp` | Kapso WhatsApp deliveries |
//! | POST | `/webhooks/telegram` | Telegram Bot API updates |
//! | POST | `/webhooks/instagram` | not implemented (501) |
//! | POST | `/inbound/email` | bank notification emails |
//!
//! Every chat and email delivery is claimed in the webhook ledger before it
//! is processed, so provider retries never double-process a message.

pub mod config;
pub mod error;
pub mod ledger;
pub mod routes;
pub mod state;
pub mod sweeps;

use axum::Router;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

/// Build the application with its state attached.
pub fn build_app(state: AppState) -> Router {
    routes::router().with_state(state)
}

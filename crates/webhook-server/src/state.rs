//! Application state shared across handlers.

use std::sync::Arc;

use channels::SignatureVerifier;
use database::Database;
use expense_core::ChannelTransport;
use pipeline::{ChatRouter, ExpenseFlow};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Database,
    /// Routes chat messages through the expense flow.
    pub router: Arc<ChatRouter>,
    /// WhatsApp transport. Also carries the email-ingestion prompts.
    pub whatsapp: Arc<dyn ChannelTransport>,
    /// Used to report legacy WhatsApp signatures.
    pub whatsapp_signatures: Arc<SignatureVerifier>,
    /// Telegram transport, built once at startup. `None` without a bot token.
    pub telegram: Option<Arc<dyn ChannelTransport>>,
    /// Verifies the inbound-email endpoint.
    pub email_signatures: Arc<SignatureVerifier>,
}

impl AppState {
    pub fn flow(&self) -> &ExpenseFlow {
        self.router.flow()
    }
}

//! Port traits for external collaborators.
//!
//! Each trait is object-safe and meant to be used behind `Arc<dyn Trait>`,
//! with one implementation per provider chosen at composition time.

use async_trait::async_trait;
use http::HeaderMap;

use crate::category::{Category, Classification};
use crate::error::PortError;
use crate::message::{IncomingAttachment, IncomingMessage, MediaPayload, SentMessage};
use crate::transaction::ExtractedTransaction;

/// Turns free text into a structured transaction candidate.
#[async_trait]
pub trait TransactionExtractor: Send + Sync {
    /// Extract a transaction, or `None` when the text holds no transaction.
    async fn extract_transaction(&self, input: &str) -> Result<Option<ExtractedTransaction>, PortError>;
}

/// Maps a user's reply onto one of the available categories.
#[async_trait]
pub trait CategoryClassifier: Send + Sync {
    async fn classify_category(
        &self,
        reply: &str,
        categories: &[Category],
    ) -> Result<Classification, PortError>;
}

/// What a generated message should say.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageRequest {
    /// Ask the user which category a new pending expense belongs to.
    AskCategory {
        amount: f64,
        currency: String,
        merchant: String,
    },
    /// Confirm the category an expense was filed under.
    Confirmation { category_name: String },
}

impl MessageRequest {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MessageRequest::AskCategory { .. } => "ask_category",
            MessageRequest::Confirmation { .. } => "confirmation",
        }
    }

    /// Text used when the generator cannot produce anything better.
    pub fn fallback_text(&self) -> String {
        match self {
            MessageRequest::AskCategory { merchant, .. } => {
                let merchant = if merchant.trim().is_empty() {
                    "un comercio"
                } else {
                    merchant.as_str()
                };
                format!("Hola, vi este gasto en {}. ¿Qué categoría le pongo?", merchant)
            }
            MessageRequest::Confirmation { category_name } => {
                format!("Listo, ya lo guardé en {}.", category_name)
            }
        }
    }
}

/// Produces natural-language messages for the user.
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate_message(&self, request: &MessageRequest) -> Result<String, PortError>;
}

/// Reads text out of receipt images.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognized text, or `None` when nothing legible was found.
    async fn extract_text(&self, image: &[u8], mime_type: Option<&str>) -> Result<Option<String>, PortError>;
}

/// A messaging channel: outbound delivery plus inbound webhook handling.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Channel id this transport serves (`whatsapp`, `telegram`).
    fn channel(&self) -> &str;

    /// Deliver a text message to a user.
    async fn send_message(&self, user_id: &str, text: &str) -> Result<SentMessage, PortError>;

    /// Check that a webhook body comes from the provider.
    async fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<bool, PortError>;

    /// Parse a webhook body into a message, or `None` when it carries none.
    async fn parse_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<IncomingMessage>, PortError>;

    /// Fetch the bytes behind a provider-hosted attachment.
    ///
    /// Default implementation resolves nothing.
    async fn resolve_attachment(&self, attachment: &IncomingAttachment) -> Result<Option<MediaPayload>, PortError> {
        let _ = attachment;
        Ok(None)
    }
}

/// Blob storage for media payloads.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: &[u8], content_type: Option<&str>) -> Result<(), PortError>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> Result<(), PortError>;
}

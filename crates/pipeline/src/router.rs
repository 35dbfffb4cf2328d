//! Per-message routing: reply to an open question, or ingest a new expense
//! from text and receipt images.

use std::sync::Arc;

use expense_core::{ChannelTransport, IncomingMessage, OcrEngine};
use tracing::info;

use crate::error::PipelineError;
use crate::flow::ExpenseFlow;
use crate::media::{MediaArchive, MediaOrigin};

/// Sent when nothing usable could be read from a message.
pub const GUIDANCE_MESSAGE: &str =
    "No pude identificar un gasto. Envía texto como: 'S/ 50 en Tambo hoy' o una foto clara del comprobante.";

/// What the router did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The message answered an open question.
    Replied { categorized: bool },
    /// The message created a pending expense.
    Ingested { expense_id: String },
    /// The user got (or needed) guidance instead.
    Guided,
}

impl RouteOutcome {
    pub fn is_categorized(&self) -> bool {
        matches!(self, RouteOutcome::Replied { categorized: true })
    }
}

/// Routes inbound chat messages through the expense flow.
pub struct ChatRouter {
    flow: Arc<ExpenseFlow>,
    ocr: Arc<dyn OcrEngine>,
    media: MediaArchive,
}

impl ChatRouter {
    pub fn new(flow: Arc<ExpenseFlow>, ocr: Arc<dyn OcrEngine>, media: MediaArchive) -> Self {
        Self { flow, ocr, media }
    }

    pub fn flow(&self) -> &ExpenseFlow {
        &self.flow
    }

    pub fn media(&self) -> &MediaArchive {
        &self.media
    }

    /// Route one message from a known customer.
    ///
    /// `event_id` names the delivery and keys any stored media.
    pub async fn route(
        &self,
        customer_id: &str,
        message: &IncomingMessage,
        event_id: &str,
        transport: &dyn ChannelTransport,
    ) -> Result<RouteOutcome, PipelineError> {
        let channel = transport.channel();
        let user_id = message.user_id.as_str();
        let text = message.text.trim();
        let images: Vec<_> = message.images().collect();

        let pending = self
            .flow
            .conversations()
            .get(customer_id, channel, user_id)
            .await?;

        if pending.is_some() {
            if text.is_empty() {
                if !images.is_empty() {
                    self.send_guidance(transport, user_id).await?;
                }
                return Ok(RouteOutcome::Guided);
            }

            let reply = IncomingMessage {
                channel: channel.to_string(),
                text: text.to_string(),
                ..message.clone()
            };
            let outcome = self.flow.resolve_reply(customer_id, &reply, transport).await?;
            return Ok(RouteOutcome::Replied {
                categorized: outcome.categorized,
            });
        }

        let mut segments = Vec::new();
        if !text.is_empty() {
            segments.push(text.to_string());
        }

        let origin = MediaOrigin {
            customer_id,
            channel,
            user_id,
            event_id,
        };
        let mut media_ids = Vec::new();

        for attachment in images {
            let Some(payload) = self.media.fetch(attachment, transport).await? else {
                continue;
            };
            if payload.data.is_empty() {
                continue;
            }

            let ocr_text = self
                .ocr
                .extract_text(&payload.data, payload.mime_type.as_deref())
                .await
                .map_err(PipelineError::Ocr)?
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());

            if let Some(ocr_text) = &ocr_text {
                segments.push(ocr_text.clone());
            }

            let stored = self
                .media
                .store(origin, media_ids.len(), &payload, ocr_text.as_deref())
                .await?;
            media_ids.push(stored.id);
        }

        let source_text = segments.join("\n");
        let source_text = source_text.trim();
        if source_text.is_empty() {
            self.send_guidance(transport, user_id).await?;
            info!(customer_id, channel, "chat.empty_input_guidance");
            return Ok(RouteOutcome::Guided);
        }

        let created = match self
            .flow
            .ingest(customer_id, source_text, transport, user_id)
            .await
        {
            Ok(created) => created,
            Err(PipelineError::InvalidTransaction(_)) => {
                self.send_guidance(transport, user_id).await?;
                return Ok(RouteOutcome::Guided);
            }
            Err(e) => return Err(e),
        };

        let Some(expense) = created else {
            self.send_guidance(transport, user_id).await?;
            info!(customer_id, channel, "chat.no_transaction_guidance");
            return Ok(RouteOutcome::Guided);
        };

        self.media.link_expense(&media_ids, &expense.id).await?;
        Ok(RouteOutcome::Ingested { expense_id: expense.id })
    }

    async fn send_guidance(&self, transport: &dyn ChannelTransport, user_id: &str) -> Result<(), PipelineError> {
        transport
            .send_message(user_id, GUIDANCE_MESSAGE)
            .await
            .map_err(PipelineError::ChannelSend)?;
        Ok(())
    }
}

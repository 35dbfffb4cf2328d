//! Inbound and outbound message types.

use serde::{Deserialize, Serialize};

/// The kind of media attached to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// A photo or image document.
    Image,
}

/// An attachment on an inbound message.
///
/// Providers either inline the bytes, give a URL, or give a provider file id
/// that the transport knows how to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingAttachment {
    pub kind: AttachmentKind,
    pub url: Option<String>,
    pub mime_type: Option<String>,
    pub provider_file_id: Option<String>,
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
}

impl IncomingAttachment {
    /// An image attachment carrying its bytes inline.
    pub fn inline_image(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            kind: AttachmentKind::Image,
            url: None,
            mime_type: Some(mime_type.into()),
            provider_file_id: None,
            data: Some(data),
        }
    }

    /// An image attachment identified by a provider file id.
    pub fn provider_image(file_id: impl Into<String>, mime_type: Option<String>) -> Self {
        Self {
            kind: AttachmentKind::Image,
            url: None,
            mime_type,
            provider_file_id: Some(file_id.into()),
            data: None,
        }
    }

    /// Whether this attachment is an image.
    pub fn is_image(&self) -> bool {
        self.kind == AttachmentKind::Image
    }
}

/// A normalized inbound chat message from any provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Channel id, e.g. `whatsapp` or `telegram`.
    pub channel: String,
    /// Provider-side user id (phone number, chat id).
    pub user_id: String,
    /// Message text, possibly empty for media-only messages.
    pub text: String,
    /// RFC 3339 timestamp of the message.
    pub timestamp: String,
    /// Provider's identifier for the logical event, when it has one.
    pub provider_event_id: Option<String>,
    /// SHA-256 hex of the raw webhook body.
    pub payload_hash: Option<String>,
    pub attachments: Vec<IncomingAttachment>,
    /// The provider payload as received.
    pub raw: serde_json::Value,
}

impl IncomingMessage {
    /// Create a text-only message.
    pub fn text(
        channel: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            user_id: user_id.into(),
            text: text.into(),
            timestamp: timestamp.into(),
            provider_event_id: None,
            payload_hash: None,
            attachments: Vec::new(),
            raw: serde_json::Value::Null,
        }
    }

    /// Attach a provider event id.
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.provider_event_id = Some(event_id.into());
        self
    }

    /// Attach an image.
    pub fn with_attachment(mut self, attachment: IncomingAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Image attachments only.
    pub fn images(&self) -> impl Iterator<Item = &IncomingAttachment> {
        self.attachments.iter().filter(|a| a.is_image())
    }
}

/// Raw media bytes resolved from an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub data: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Result of a successful outbound send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    /// Provider's id for the delivered message.
    pub provider_message_id: String,
}

impl SentMessage {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            provider_message_id: id.into(),
        }
    }
}

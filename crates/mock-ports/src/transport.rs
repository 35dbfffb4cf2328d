//! Recording channel transport.

use std::collections::HashMap;

use async_trait::async_trait;
use expense_core::{
    ChannelTransport, IncomingAttachment, IncomingMessage, MediaPayload, PortError, SentMessage,
};
use http::HeaderMap;
use tokio::sync::Mutex;

/// How `send_message` should fail, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendFailure {
    Unavailable,
    RateLimited,
}

/// A transport that records outbound messages instead of delivering them.
///
/// Webhooks parse as JSON-encoded [`IncomingMessage`] bodies, which keeps
/// router and server tests free of provider payload details.
#[derive(Debug)]
pub struct RecordingTransport {
    channel: String,
    sent: Mutex<Vec<(String, String)>>,
    failure: Option<SendFailure>,
    accept_signatures: bool,
    attachments: HashMap<String, MediaPayload>,
}

impl RecordingTransport {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            sent: Mutex::new(Vec::new()),
            failure: None,
            accept_signatures: true,
            attachments: HashMap::new(),
        }
    }

    /// A transport whose sends fail as if the provider were down.
    pub fn failing(channel: impl Into<String>) -> Self {
        Self {
            failure: Some(SendFailure::Unavailable),
            ..Self::new(channel)
        }
    }

    /// A transport whose sends are rejected with a rate limit.
    pub fn rate_limited(channel: impl Into<String>) -> Self {
        Self {
            failure: Some(SendFailure::RateLimited),
            ..Self::new(channel)
        }
    }

    /// Reject every webhook signature.
    pub fn rejecting_signatures(mut self) -> Self {
        self.accept_signatures = false;
        self
    }

    /// Serve bytes for a provider file id.
    pub fn with_attachment(mut self, file_id: impl Into<String>, payload: MediaPayload) -> Self {
        self.attachments.insert(file_id.into(), payload);
        self
    }

    /// Every `(user_id, text)` sent so far.
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }

    /// Texts sent so far, in order.
    pub async fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|(_, text)| text.clone()).collect()
    }
}

#[async_trait]
impl ChannelTransport for RecordingTransport {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn send_message(&self, user_id: &str, text: &str) -> Result<SentMessage, PortError> {
        match self.failure {
            Some(SendFailure::Unavailable) => {
                return Err(PortError::Unavailable(format!("{} is down", self.channel)))
            }
            Some(SendFailure::RateLimited) => {
                return Err(PortError::RateLimited(format!("{} throttled", self.channel)))
            }
            None => {}
        }

        let mut sent = self.sent.lock().await;
        sent.push((user_id.to_string(), text.to_string()));
        Ok(SentMessage::new(format!("{}-{}", self.channel, sent.len())))
    }

    async fn verify_webhook(&self, _headers: &HeaderMap, _body: &[u8]) -> Result<bool, PortError> {
        Ok(self.accept_signatures)
    }

    async fn parse_webhook(&self, _headers: &HeaderMap, body: &[u8]) -> Result<Option<IncomingMessage>, PortError> {
        Ok(serde_json::from_slice(body).ok())
    }

    async fn resolve_attachment(&self, attachment: &IncomingAttachment) -> Result<Option<MediaPayload>, PortError> {
        Ok(attachment
            .provider_file_id
            .as_ref()
            .and_then(|id| self.attachments.get(id))
            .cloned())
    }
}

//! WhatsApp transport through the Kapso partner API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use expense_core::{ChannelTransport, IncomingMessage, PortError, SentMessage};
use http::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::KapsoConfig;
use crate::error::ChannelError;
use crate::signature::{SignatureCheck, SignatureVerifier};

/// Channel id served by this transport.
pub const WHATSAPP_CHANNEL: &str = "whatsapp";

/// Provider message id returned when sending is not configured.
pub const NOOP_MESSAGE_ID: &str = "kapso-noop";

const UNKNOWN_MESSAGE_ID: &str = "kapso-unknown";

#[derive(Debug, Serialize)]
struct SendBody<'a> {
    to: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
    message_id: Option<String>,
}

/// Client for the Kapso WhatsApp API.
#[derive(Clone)]
pub struct KapsoClient {
    http: Client,
    config: KapsoConfig,
    verifier: SignatureVerifier,
}

impl KapsoClient {
    pub fn new(config: KapsoConfig, verifier: SignatureVerifier) -> Result<Self, ChannelError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ChannelError::Http)?;
        Ok(Self { http, config, verifier })
    }

    pub fn config(&self) -> &KapsoConfig {
        &self.config
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    /// Check a webhook signature, returning the detailed outcome.
    pub fn check_signature(&self, headers: &HeaderMap, body: &[u8]) -> SignatureCheck {
        self.verifier.check(headers, body)
    }

    /// Send a text message.
    pub async fn send_text(&self, to: &str, text: &str) -> Result<SentMessage, ChannelError> {
        let (Some(url), Some(api_key)) = (self.config.messages_url(), self.config.api_key.as_deref()) else {
            debug!(to = %to, "kapso.send_skipped_unconfigured");
            return Ok(SentMessage::new(NOOP_MESSAGE_ID));
        };

        let resp = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&SendBody { to, text })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "kapso.send_failed");
            return Err(ChannelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: SendResponse = resp.json().await?;
        let id = payload
            .id
            .or(payload.message_id)
            .unwrap_or_else(|| UNKNOWN_MESSAGE_ID.to_string());
        Ok(SentMessage::new(id))
    }
}

#[async_trait]
impl ChannelTransport for KapsoClient {
    fn channel(&self) -> &str {
        WHATSAPP_CHANNEL
    }

    async fn send_message(&self, user_id: &str, text: &str) -> Result<SentMessage, PortError> {
        Ok(self.send_text(user_id, text).await?)
    }

    async fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<bool, PortError> {
        Ok(self.verifier.verify(headers, body))
    }

    async fn parse_webhook(&self, _headers: &HeaderMap, body: &[u8]) -> Result<Option<IncomingMessage>, PortError> {
        Ok(parse_payload(body)?)
    }
}

/// Parse a Kapso webhook body.
///
/// Accepts a flat payload (`userId`/`from`/`phone` with `text`/`message`) or a
/// nested `message` object with `from` and `text`. Returns `None` when no
/// sender and text can be found. The event id is the payload `id`, or
/// `hash:<sha256>` of the body when absent.
pub fn parse_payload(body: &[u8]) -> Result<Option<IncomingMessage>, ChannelError> {
    let payload: Value = serde_json::from_slice(body)?;
    let Some(record) = payload.as_object() else {
        return Ok(None);
    };

    let Some((user_id, text, timestamp)) = flat_message(record).or_else(|| nested_message(record)) else {
        return Ok(None);
    };

    let payload_hash = hex::encode(Sha256::digest(body));
    let event_id = non_empty_str(record, "id")
        .map(str::to_string)
        .unwrap_or_else(|| format!("hash:{}", payload_hash));

    let mut message = IncomingMessage::text(WHATSAPP_CHANNEL, user_id, text, to_rfc3339(timestamp))
        .with_event_id(event_id);
    message.payload_hash = Some(payload_hash);
    message.raw = payload;
    Ok(Some(message))
}

fn flat_message(record: &Map<String, Value>) -> Option<(String, String, Option<&Value>)> {
    let from = non_empty_str(record, "userId")
        .or_else(|| non_empty_str(record, "from"))
        .or_else(|| non_empty_str(record, "phone"))?;
    let text = non_empty_str(record, "text").or_else(|| non_empty_str(record, "message"))?;
    Some((from.to_string(), text.to_string(), record.get("timestamp")))
}

fn nested_message(record: &Map<String, Value>) -> Option<(String, String, Option<&Value>)> {
    let nested = record.get("message")?.as_object()?;
    let from = nested.get("from")?.as_str()?;
    let text = nested.get("text")?.as_str()?;
    Some((from.to_string(), text.to_string(), nested.get("timestamp")))
}

fn non_empty_str<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Strings are kept as sent; numbers are unix seconds.
fn to_rfc3339(timestamp: Option<&Value>) -> String {
    match timestamp {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp_millis((secs * 1000.0) as i64))
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        _ => Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_payload() {
        let body = br#"{"id":"evt_123","from":"51999999999","text":"comida","timestamp":1739980000}"#;
        let msg = parse_payload(body).unwrap().unwrap();
        assert_eq!(msg.channel, "whatsapp");
        assert_eq!(msg.user_id, "51999999999");
        assert_eq!(msg.text, "comida");
        assert_eq!(msg.provider_event_id.as_deref(), Some("evt_123"));
        assert_eq!(msg.timestamp, "2025-02-19T15:46:40.000Z");
        assert_eq!(msg.payload_hash.as_ref().map(|h| h.len()), Some(64));
    }

    #[test]
    fn test_user_id_precedence() {
        let body = br#"{"userId":"u-1","from":"51999","phone":"51888","message":"hola"}"#;
        let msg = parse_payload(body).unwrap().unwrap();
        assert_eq!(msg.user_id, "u-1");
        assert_eq!(msg.text, "hola");
    }

    #[test]
    fn test_nested_payload() {
        let body = br#"{"message":{"from":"51999","text":"S/ 50 en Tambo","timestamp":"2026-02-20T10:00:00Z"}}"#;
        let msg = parse_payload(body).unwrap().unwrap();
        assert_eq!(msg.user_id, "51999");
        assert_eq!(msg.text, "S/ 50 en Tambo");
        assert_eq!(msg.timestamp, "2026-02-20T10:00:00Z");
    }

    #[test]
    fn test_hash_fallback_event_id_is_deterministic() {
        let body = br#"{"from":"51999999999","text":"comida","timestamp":1739980000}"#;
        let first = parse_payload(body).unwrap().unwrap();
        let second = parse_payload(body).unwrap().unwrap();
        let event_id = first.provider_event_id.unwrap();
        assert!(event_id.starts_with("hash:"));
        assert_eq!(event_id.len(), "hash:".len() + 64);
        assert_eq!(Some(event_id), second.provider_event_id);
    }

    #[test]
    fn test_payload_without_message() {
        assert!(parse_payload(br#"{"from":"51999"}"#).unwrap().is_none());
        assert!(parse_payload(br#"[1,2,3]"#).unwrap().is_none());
        assert!(parse_payload(br#"{"message":{"from":"51999"}}"#).unwrap().is_none());
        assert!(parse_payload(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_send_without_config_is_noop() {
        let client = KapsoClient::new(
            KapsoConfig::default(),
            SignatureVerifier::new(crate::signature::SignatureConfig::disabled(
                crate::signature::KAPSO_SIGNATURE_HEADERS,
            )),
        )
        .unwrap();
        let sent = client.send_message("51999", "hola").await.unwrap();
        assert_eq!(sent.provider_message_id, NOOP_MESSAGE_ID);
    }
}

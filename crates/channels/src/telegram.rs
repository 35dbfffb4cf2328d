//! Telegram Bot API transport.
//!
//! Inbound updates arrive on a webhook authenticated by the
//! `X-Telegram-Bot-Api-Secret-Token` header. Only private chats are turned
//! into [`IncomingMessage`]s; anything else is reported so the caller can
//! answer with a DM-only notice.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use expense_core::{ChannelTransport, IncomingAttachment, IncomingMessage, MediaPayload, PortError, SentMessage};
use http::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::TelegramConfig;
use crate::error::ChannelError;
use crate::signature::constant_time_eq;

/// Channel id served by this transport.
pub const TELEGRAM_CHANNEL: &str = "telegram";

/// Header carrying the webhook secret token.
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// A Telegram update, reduced to the fields we read.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub date: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub mime_type: Option<String>,
}

/// What an update means for the bot.
#[derive(Debug, Clone, PartialEq)]
pub enum TelegramInbound {
    /// A message in a private chat.
    Direct(IncomingMessage),
    /// A message in a group or channel.
    NotPrivate { chat_id: String, event_id: String },
    /// An update without a message (edits, callbacks, joins).
    Ignored,
}

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SentResult {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct FileResult {
    file_path: Option<String>,
}

/// Client for one Telegram bot.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    config: TelegramConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramConfig) -> Result<Self, ChannelError> {
        if config.bot_token.trim().is_empty() {
            return Err(ChannelError::Config("bot token is empty".to_string()));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ChannelError::Http)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    /// Check the secret-token header. Passes when no secret is configured.
    pub fn verify_secret_token(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = self.config.webhook_secret.as_deref() else {
            return true;
        };
        headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|provided| constant_time_eq(provided.as_bytes(), expected.as_bytes()))
    }

    /// Send a text message to a chat.
    pub async fn send_text(&self, chat_id: &str, text: &str) -> Result<SentMessage, ChannelError> {
        let resp = self
            .http
            .post(self.config.method_url("sendMessage"))
            .json(&SendMessageBody { chat_id, text })
            .send()
            .await?;

        let result: SentResult = read_api_response(resp).await?;
        Ok(SentMessage::new(result.message_id.to_string()))
    }

    /// Resolve a file id to its download path.
    pub async fn get_file_path(&self, file_id: &str) -> Result<String, ChannelError> {
        let url = format!(
            "{}?file_id={}",
            self.config.method_url("getFile"),
            urlencoding::encode(file_id)
        );
        let resp = self.http.get(&url).send().await?;
        let file: FileResult = read_api_response(resp).await?;
        file.file_path.ok_or_else(|| ChannelError::Api {
            status: 200,
            body: format!("file {} has no path", file_id),
        })
    }

    /// Download a file by id.
    pub async fn download_file(&self, file_id: &str) -> Result<(Vec<u8>, String), ChannelError> {
        let path = self.get_file_path(file_id).await?;
        let resp = self.http.get(self.config.file_url(&path)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await?;
        debug!(file_id = %file_id, size = bytes.len(), "telegram.file_downloaded");
        Ok((bytes.to_vec(), path))
    }
}

async fn read_api_response<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, ChannelError> {
    let status = resp.status();
    let text = resp.text().await?;
    let parsed: Option<ApiResponse<T>> = serde_json::from_str(&text).ok();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = parsed.and_then(|p| p.parameters).and_then(|p| p.retry_after);
        warn!(retry_after = ?retry_after, "telegram.rate_limited");
        return Err(ChannelError::RateLimited { retry_after });
    }

    match parsed {
        Some(ApiResponse {
            ok: true,
            result: Some(result),
            ..
        }) if status.is_success() => Ok(result),
        Some(ApiResponse { description, .. }) => Err(ChannelError::Api {
            status: status.as_u16(),
            body: description.unwrap_or(text),
        }),
        None => Err(ChannelError::Api {
            status: status.as_u16(),
            body: text,
        }),
    }
}

#[async_trait]
impl ChannelTransport for TelegramClient {
    fn channel(&self) -> &str {
        TELEGRAM_CHANNEL
    }

    async fn send_message(&self, user_id: &str, text: &str) -> Result<SentMessage, PortError> {
        Ok(self.send_text(user_id, text).await?)
    }

    async fn verify_webhook(&self, headers: &HeaderMap, _body: &[u8]) -> Result<bool, PortError> {
        Ok(self.verify_secret_token(headers))
    }

    async fn parse_webhook(&self, _headers: &HeaderMap, body: &[u8]) -> Result<Option<IncomingMessage>, PortError> {
        match parse_update(body)? {
            TelegramInbound::Direct(message) => Ok(Some(message)),
            _ => Ok(None),
        }
    }

    async fn resolve_attachment(&self, attachment: &IncomingAttachment) -> Result<Option<MediaPayload>, PortError> {
        let Some(file_id) = attachment.provider_file_id.as_deref() else {
            return Ok(None);
        };
        let (data, path) = self.download_file(file_id).await?;
        let mime_type = attachment
            .mime_type
            .clone()
            .or_else(|| mime_from_path(&path).map(str::to_string));
        Ok(Some(MediaPayload { data, mime_type }))
    }
}

/// Parse a webhook body into what the bot should do with it.
///
/// The event id is `update:<update_id>`. The largest photo (or an image
/// document) becomes a provider attachment; the caption stands in for text.
pub fn parse_update(body: &[u8]) -> Result<TelegramInbound, ChannelError> {
    let update: Update = serde_json::from_slice(body)?;
    let event_id = format!("update:{}", update.update_id);

    let Some(message) = update.message else {
        return Ok(TelegramInbound::Ignored);
    };

    if !message.chat.is_private() {
        return Ok(TelegramInbound::NotPrivate {
            chat_id: message.chat.id.to_string(),
            event_id,
        });
    }

    let user_id = message
        .from
        .as_ref()
        .map(|u| u.id)
        .unwrap_or(message.chat.id)
        .to_string();
    let text = message
        .text
        .as_deref()
        .or(message.caption.as_deref())
        .unwrap_or_default()
        .trim()
        .to_string();
    let timestamp = DateTime::<Utc>::from_timestamp(message.date, 0)
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    let mut incoming = IncomingMessage::text(TELEGRAM_CHANNEL, user_id, text, timestamp).with_event_id(event_id);
    if let Some(photo) = largest_photo(message.photo.as_deref().unwrap_or_default()) {
        incoming = incoming.with_attachment(IncomingAttachment::provider_image(
            &photo.file_id,
            Some("image/jpeg".to_string()),
        ));
    }
    if let Some(doc) = message
        .document
        .as_ref()
        .filter(|d| d.mime_type.as_deref().is_some_and(|m| m.starts_with("image/")))
    {
        incoming = incoming.with_attachment(IncomingAttachment::provider_image(&doc.file_id, doc.mime_type.clone()));
    }

    incoming.payload_hash = Some(hex::encode(Sha256::digest(body)));
    incoming.raw = serde_json::from_slice(body)?;
    Ok(TelegramInbound::Direct(incoming))
}

fn largest_photo(sizes: &[PhotoSize]) -> Option<&PhotoSize> {
    sizes
        .iter()
        .max_by_key(|p| (p.file_size.unwrap_or(0), u64::from(p.width) * u64::from(p.height)))
}

fn mime_from_path(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_private_text_message() {
        let body = br#"{"update_id":9,"message":{"message_id":1,"date":1771581600,
            "chat":{"id":42,"type":"private"},"from":{"id":42},"text":" S/ 50 en Tambo "}}"#;
        let TelegramInbound::Direct(msg) = parse_update(body).unwrap() else {
            panic!("expected a direct message");
        };
        assert_eq!(msg.channel, "telegram");
        assert_eq!(msg.user_id, "42");
        assert_eq!(msg.text, "S/ 50 en Tambo");
        assert_eq!(msg.provider_event_id.as_deref(), Some("update:9"));
        assert_eq!(msg.timestamp, "2026-02-20T10:00:00.000Z");
        assert!(msg.attachments.is_empty());
        assert!(msg.payload_hash.is_some());
    }

    #[test]
    fn test_photo_with_caption_picks_largest() {
        let body = br#"{"update_id":10,"message":{"message_id":2,"date":1771581600,
            "chat":{"id":42,"type":"private"},"from":{"id":42},"caption":"boleta",
            "photo":[{"file_id":"small","width":90,"height":90,"file_size":1200},
                     {"file_id":"large","width":1280,"height":960,"file_size":98000},
                     {"file_id":"medium","width":320,"height":240,"file_size":14000}]}}"#;
        let TelegramInbound::Direct(msg) = parse_update(body).unwrap() else {
            panic!("expected a direct message");
        };
        assert_eq!(msg.text, "boleta");
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(msg.attachments[0].provider_file_id.as_deref(), Some("large"));
        assert_eq!(msg.attachments[0].mime_type.as_deref(), Some("image/jpeg"));
    }

    #[test]
    fn test_image_document_is_attached() {
        let body = br#"{"update_id":11,"message":{"message_id":3,"date":1771581600,
            "chat":{"id":42,"type":"private"},
            "document":{"file_id":"doc-1","mime_type":"image/png"}}}"#;
        let TelegramInbound::Direct(msg) = parse_update(body).unwrap() else {
            panic!("expected a direct message");
        };
        assert_eq!(msg.user_id, "42");
        assert_eq!(msg.text, "");
        assert_eq!(msg.attachments[0].provider_file_id.as_deref(), Some("doc-1"));
    }

    #[test]
    fn test_group_chat_is_not_private() {
        let body = br#"{"update_id":12,"message":{"message_id":4,"date":1771581600,
            "chat":{"id":-1001,"type":"supergroup"},"from":{"id":42},"text":"hola"}}"#;
        assert_eq!(
            parse_update(body).unwrap(),
            TelegramInbound::NotPrivate {
                chat_id: "-1001".to_string(),
                event_id: "update:12".to_string(),
            }
        );
    }

    #[test]
    fn test_update_without_message_is_ignored() {
        assert_eq!(
            parse_update(br#"{"update_id":13,"edited_message":{}}"#).unwrap(),
            TelegramInbound::Ignored
        );
        assert!(parse_update(b"{}").is_err());
    }

    #[test]
    fn test_secret_token() {
        let client = TelegramClient::new(TelegramConfig::new("123:abc").with_webhook_secret("s3cret")).unwrap();
        let mut headers = HeaderMap::new();
        assert!(!client.verify_secret_token(&headers));
        headers.insert(SECRET_TOKEN_HEADER, HeaderValue::from_static("wrong"));
        assert!(!client.verify_secret_token(&headers));
        headers.insert(SECRET_TOKEN_HEADER, HeaderValue::from_static("s3cret"));
        assert!(client.verify_secret_token(&headers));

        let open = TelegramClient::new(TelegramConfig::new("123:abc")).unwrap();
        assert!(open.verify_secret_token(&HeaderMap::new()));
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(matches!(
            TelegramClient::new(TelegramConfig::new(" ")),
            Err(ChannelError::Config(_))
        ));
    }

    #[test]
    fn test_mime_from_path() {
        assert_eq!(mime_from_path("photos/file_1.JPG"), Some("image/jpeg"));
        assert_eq!(mime_from_path("documents/r.png"), Some("image/png"));
        assert_eq!(mime_from_path("noext"), None);
    }
}

//! Integration tests for the channel transports.
//!
//! None of these talk to a provider; they cover configuration, webhook
//! parsing through the transport trait, and signature verification.

use channels::{
    sign, KapsoClient, KapsoConfig, SignatureConfig, SignatureMode, SignatureVerifier, TelegramClient,
    TelegramConfig, KAPSO_SIGNATURE_HEADERS, SECRET_TOKEN_HEADER,
};
use chrono::Utc;
use expense_core::ChannelTransport;
use http::{HeaderMap, HeaderValue};

fn kapso(secret: Option<&str>, mode: SignatureMode) -> KapsoClient {
    let config = match secret {
        Some(secret) => SignatureConfig::new(secret, KAPSO_SIGNATURE_HEADERS).with_mode(mode),
        None => SignatureConfig::disabled(KAPSO_SIGNATURE_HEADERS),
    };
    KapsoClient::new(KapsoConfig::default(), SignatureVerifier::new(config)).unwrap()
}

fn signed_headers(signature: &str, timestamp: i64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-kapso-signature", HeaderValue::from_str(signature).unwrap());
    headers.insert("x-kapso-timestamp", HeaderValue::from_str(&timestamp.to_string()).unwrap());
    headers
}

mod config_tests {
    use super::*;

    #[test]
    fn test_kapso_config_urls() {
        let config = KapsoConfig::new("https://api.kapso.ai/", "key");
        assert!(config.is_configured());
        assert_eq!(
            config.messages_url().as_deref(),
            Some("https://api.kapso.ai/platform/v1/messages")
        );
        assert!(!KapsoConfig::default().is_configured());
        assert!(KapsoConfig::default().messages_url().is_none());
    }

    #[test]
    fn test_telegram_config_urls() {
        let config = TelegramConfig::new("123:abc").with_api_base_url("http://localhost:8081/");
        assert_eq!(config.method_url("sendMessage"), "http://localhost:8081/bot123:abc/sendMessage");
        assert_eq!(
            config.file_url("photos/file_1.jpg"),
            "http://localhost:8081/file/bot123:abc/photos/file_1.jpg"
        );
        assert_eq!(TelegramConfig::new("t").api_base_url, "https://api.telegram.org");
    }
}

mod kapso_tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_current_hmac() {
        let client = kapso(Some("topsecret"), SignatureMode::Strict);
        let body = br#"{"id":"evt_1","from":"51999999999","text":"hola"}"#;
        let now = Utc::now().timestamp();
        let headers = signed_headers(&sign("topsecret", now, body), now);
        assert!(client.verify_webhook(&headers, body).await.unwrap());
    }

    #[tokio::test]
    async fn test_reject_expired_timestamp() {
        let client = kapso(Some("topsecret"), SignatureMode::Strict);
        let body = br#"{"id":"evt_1"}"#;
        let old = Utc::now().timestamp() - 3600;
        let headers = signed_headers(&sign("topsecret", old, body), old);
        assert!(!client.verify_webhook(&headers, body).await.unwrap());
    }

    #[tokio::test]
    async fn test_legacy_secret_by_mode() {
        let mut headers = HeaderMap::new();
        headers.insert("x-kapso-signature", HeaderValue::from_static("topsecret"));

        let dual = kapso(Some("topsecret"), SignatureMode::Dual);
        assert!(dual.verify_webhook(&headers, b"{}").await.unwrap());

        let strict = kapso(Some("topsecret"), SignatureMode::Strict);
        assert!(!strict.verify_webhook(&headers, b"{}").await.unwrap());
    }

    #[tokio::test]
    async fn test_unconfigured_secret_passes() {
        let client = kapso(None, SignatureMode::Strict);
        assert!(client.verify_webhook(&HeaderMap::new(), b"{}").await.unwrap());
    }

    #[tokio::test]
    async fn test_parse_through_transport() {
        let client = kapso(None, SignatureMode::Dual);
        assert_eq!(client.channel(), "whatsapp");

        let body = br#"{"id":"evt_123","from":"51999999999","text":"comida","timestamp":1739980000}"#;
        let msg = client.parse_webhook(&HeaderMap::new(), body).await.unwrap().unwrap();
        assert_eq!(msg.provider_event_id.as_deref(), Some("evt_123"));
        assert_eq!(msg.text, "comida");

        assert!(client
            .parse_webhook(&HeaderMap::new(), br#"{"status":"delivered"}"#)
            .await
            .unwrap()
            .is_none());
        assert!(client.parse_webhook(&HeaderMap::new(), b"<xml/>").await.is_err());
    }
}

mod telegram_tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_only_private_messages() {
        let client = TelegramClient::new(TelegramConfig::new("123:abc")).unwrap();
        assert_eq!(client.channel(), "telegram");

        let private = br#"{"update_id":1,"message":{"message_id":1,"date":1771581600,
            "chat":{"id":7,"type":"private"},"from":{"id":7},"text":"comida"}}"#;
        let msg = client.parse_webhook(&HeaderMap::new(), private).await.unwrap().unwrap();
        assert_eq!(msg.user_id, "7");
        assert_eq!(msg.provider_event_id.as_deref(), Some("update:1"));

        let group = br#"{"update_id":2,"message":{"message_id":2,"date":1771581600,
            "chat":{"id":-5,"type":"group"},"from":{"id":7},"text":"comida"}}"#;
        assert!(client.parse_webhook(&HeaderMap::new(), group).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verify_secret_token_header() {
        let client = TelegramClient::new(TelegramConfig::new("123:abc").with_webhook_secret("tg-secret")).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(SECRET_TOKEN_HEADER, HeaderValue::from_static("tg-secret"));
        assert!(client.verify_webhook(&headers, b"{}").await.unwrap());
        assert!(!client.verify_webhook(&HeaderMap::new(), b"{}").await.unwrap());
    }
}

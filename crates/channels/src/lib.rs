//! Chat channel transports.
//!
//! This crate provides the provider side of the [`ChannelTransport`] port:
//!
//! - [`KapsoClient`] - WhatsApp through the Kapso partner API
//! - [`TelegramClient`] - Telegram Bot API (updates, `sendMessage`, `getFile`)
//! - [`SignatureVerifier`] - timestamped HMAC-SHA256 webhook signatures
//!
//! # Example
//!
//! ```no_run
//! use channels::{KapsoClient, KapsoConfig, SignatureConfig, SignatureVerifier};
//! use expense_core::ChannelTransport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = SignatureVerifier::new(SignatureConfig::kapso_from_env()?);
//! let client = KapsoClient::new(KapsoConfig::from_env(), verifier)?;
//!
//! let sent = client.send_message("51999999999", "Hola").await?;
//! println!("sent {}", sent.provider_message_id);
//! # Ok(())
//! # }
//! ```
//!
//! [`ChannelTransport`]: expense_core::ChannelTransport

pub mod config;
pub mod error;
pub mod kapso;
pub mod signature;
pub mod telegram;

pub use config::{KapsoConfig, TelegramConfig, DEFAULT_TELEGRAM_API_BASE_URL};
pub use error::ChannelError;
pub use kapso::{parse_payload as parse_kapso_payload, KapsoClient, NOOP_MESSAGE_ID, WHATSAPP_CHANNEL};
pub use signature::{
    sign, RejectReason, SignatureCheck, SignatureConfig, SignatureHeaders, SignatureMode, SignatureVerifier,
    DEFAULT_MAX_SKEW_SECS, EMAIL_SIGNATURE_HEADERS, KAPSO_SIGNATURE_HEADERS,
};
pub use telegram::{parse_update, TelegramClient, TelegramInbound, SECRET_TOKEN_HEADER, TELEGRAM_CHANNEL};

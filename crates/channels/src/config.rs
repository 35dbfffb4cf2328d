//! Configuration types for the channel transports.

use std::env;

/// Default Telegram Bot API endpoint.
pub const DEFAULT_TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";

/// Configuration for the Kapso WhatsApp partner API.
///
/// Sending is a no-op unless both the base URL and the API key are set.
#[derive(Debug, Clone, Default)]
pub struct KapsoConfig {
    /// Base URL of the Kapso API, without a trailing slash.
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
}

impl KapsoConfig {
    pub fn new(api_base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base_url: Some(trim_base_url(api_base_url.into())),
            api_key: Some(api_key.into()),
        }
    }

    /// Read `KAPSO_API_BASE_URL` and `KAPSO_API_KEY`.
    pub fn from_env() -> Self {
        Self {
            api_base_url: non_empty_var("KAPSO_API_BASE_URL").map(trim_base_url),
            api_key: non_empty_var("KAPSO_API_KEY"),
        }
    }

    /// Whether outbound delivery is configured.
    pub fn is_configured(&self) -> bool {
        self.api_base_url.is_some() && self.api_key.is_some()
    }

    /// Get the send-message endpoint URL.
    pub fn messages_url(&self) -> Option<String> {
        self.api_base_url
            .as_ref()
            .map(|base| format!("{}/platform/v1/messages", base))
    }
}

/// Configuration for a Telegram bot.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base_url: String,
    /// Expected value of the `X-Telegram-Bot-Api-Secret-Token` header.
    pub webhook_secret: Option<String>,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base_url: DEFAULT_TELEGRAM_API_BASE_URL.to_string(),
            webhook_secret: None,
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = trim_base_url(url.into());
        self
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Read `TELEGRAM_BOT_TOKEN`, `TELEGRAM_API_BASE_URL` and
    /// `TELEGRAM_WEBHOOK_SECRET`. Returns `None` without a bot token.
    pub fn from_env() -> Option<Self> {
        let token = non_empty_var("TELEGRAM_BOT_TOKEN")?;
        let mut config = Self::new(token);
        if let Some(url) = non_empty_var("TELEGRAM_API_BASE_URL") {
            config = config.with_api_base_url(url);
        }
        if let Some(secret) = non_empty_var("TELEGRAM_WEBHOOK_SECRET") {
            config = config.with_webhook_secret(secret);
        }
        Some(config)
    }

    /// Get the URL of a Bot API method.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base_url, self.bot_token, method)
    }

    /// Get the download URL of a file returned by `getFile`.
    pub fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base_url, self.bot_token, file_path)
    }
}

pub(crate) fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

//! Configuration for the model client.

use std::env;

use crate::error::AiClientError;

pub const DEFAULT_API_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_INPUT_CHARS: usize = 6000;

/// Configuration for [`AiClient`](crate::AiClient).
#[derive(Debug, Clone)]
pub struct AiClientConfig {
    /// Base URL of an OpenAI-compatible API.
    pub api_url: String,

    pub api_key: String,

    /// Model used for extraction, classification and messages.
    pub model: String,

    /// Vision model used for OCR. Falls back to `model`.
    pub ocr_model: Option<String>,

    /// Extraction inputs are cut to this many characters.
    pub max_input_chars: usize,

    pub max_tokens: Option<u32>,

    pub temperature: Option<f32>,

    /// Overrides the built-in extraction system prompt.
    pub extraction_system_prompt: Option<String>,
}

impl Default for AiClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            ocr_model: None,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_tokens: Some(512),
            temperature: Some(0.2),
            extraction_system_prompt: None,
        }
    }
}

impl AiClientConfig {
    /// Create configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `AI_API_KEY` - API key for authentication
    ///
    /// Optional environment variables:
    /// - `AI_API_URL` - API URL (default: https://api.openai.com)
    /// - `AI_MODEL` - Model name (default: gpt-4o-mini)
    /// - `AI_OCR_MODEL` - Vision model for OCR (default: same as `AI_MODEL`)
    /// - `AI_MAX_INPUT_CHARS` - Extraction input cap (default: 6000)
    /// - `AI_SYSTEM_PROMPT` - Extraction system prompt override
    pub fn from_env() -> Result<Self, AiClientError> {
        let api_key = env::var("AI_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AiClientError::Configuration("AI_API_KEY not set".to_string()))?;

        let api_url = env::var("AI_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let model = env::var("AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let ocr_model = env::var("AI_OCR_MODEL").ok().filter(|v| !v.is_empty());

        let max_input_chars = env::var("AI_MAX_INPUT_CHARS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_INPUT_CHARS);

        let extraction_system_prompt = env::var("AI_SYSTEM_PROMPT").ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            ocr_model,
            max_input_chars,
            extraction_system_prompt,
            ..Self::default()
        })
    }

    pub fn builder() -> AiClientConfigBuilder {
        AiClientConfigBuilder::default()
    }

    /// Model used for OCR requests.
    pub fn ocr_model(&self) -> &str {
        self.ocr_model.as_deref().unwrap_or(&self.model)
    }

    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.api_url)
    }
}

/// Builder for [`AiClientConfig`].
#[derive(Debug, Default)]
pub struct AiClientConfigBuilder {
    config: AiClientConfig,
}

impl AiClientConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = Some(model.into());
        self
    }

    pub fn max_input_chars(mut self, chars: usize) -> Self {
        self.config.max_input_chars = chars;
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = Some(tokens);
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    pub fn extraction_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_system_prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> AiClientConfig {
        self.config
    }
}

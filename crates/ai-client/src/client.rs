//! The chat-completions client and its port implementations.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use expense_core::{
    heuristic_match, Category, CategoryClassifier, Classification, ExtractedTransaction, MessageGenerator,
    MessageRequest, OcrEngine, PortError, TransactionExtractor,
};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api_types::{ApiError, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ResponseFormat};
use crate::config::AiClientConfig;
use crate::error::AiClientError;
use crate::prompts;

/// Client for an OpenAI-compatible chat-completions API.
#[derive(Clone)]
pub struct AiClient {
    client: Client,
    config: AiClientConfig,
}

impl AiClient {
    pub fn new(config: AiClientConfig) -> Result<Self, AiClientError> {
        if config.api_key.is_empty() {
            return Err(AiClientError::Configuration("API key is required".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AiClientError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, AiClientError> {
        Self::new(AiClientConfig::from_env()?)
    }

    pub fn config(&self) -> &AiClientConfig {
        &self.config
    }

    async fn chat_completion(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        response_format: Option<ResponseFormat>,
    ) -> Result<ChatCompletionResponse, AiClientError> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format,
        };

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&error_text)
                .map(|e| e.error.describe())
                .unwrap_or(error_text);
            return Err(AiClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        debug!(model = %completion.model, usage = ?completion.usage, "ai.completion_received");
        Ok(completion)
    }

    fn cap_input<'a>(&self, input: &'a str) -> &'a str {
        match input.char_indices().nth(self.config.max_input_chars) {
            Some((idx, _)) => &input[..idx],
            None => input,
        }
    }
}

#[async_trait]
impl TransactionExtractor for AiClient {
    async fn extract_transaction(&self, input: &str) -> Result<Option<ExtractedTransaction>, PortError> {
        let input = self.cap_input(input);
        let system = self
            .config
            .extraction_system_prompt
            .as_deref()
            .unwrap_or(prompts::EXTRACTION_SYSTEM_PROMPT);

        let completion = self
            .chat_completion(
                &self.config.model,
                vec![
                    ChatMessage::system(system),
                    ChatMessage::user(prompts::extract_transaction_prompt(input)),
                ],
                Some(ResponseFormat::json_schema("transaction", prompts::transaction_schema())),
            )
            .await?;

        let Some(payload) = completion.first_text().and_then(parse_json_content) else {
            return Ok(None);
        };
        Ok(normalize_extracted(&payload, input))
    }
}

#[async_trait]
impl CategoryClassifier for AiClient {
    async fn classify_category(&self, reply: &str, categories: &[Category]) -> Result<Classification, PortError> {
        if let Some(found) = heuristic_match(reply, categories) {
            return Ok(found);
        }

        let completion = self
            .chat_completion(
                &self.config.model,
                vec![
                    ChatMessage::system(prompts::CLASSIFICATION_SYSTEM_PROMPT),
                    ChatMessage::user(prompts::classify_category_prompt(reply, categories)),
                ],
                Some(ResponseFormat::json_schema("classification", prompts::classification_schema())),
            )
            .await?;

        Ok(completion
            .first_text()
            .and_then(parse_json_content)
            .map(|payload| normalize_classification(&payload))
            .unwrap_or_else(Classification::unmatched))
    }
}

#[async_trait]
impl MessageGenerator for AiClient {
    async fn generate_message(&self, request: &MessageRequest) -> Result<String, PortError> {
        let completion = self
            .chat_completion(
                &self.config.model,
                vec![
                    ChatMessage::system(prompts::MESSAGE_SYSTEM_PROMPT),
                    ChatMessage::user(prompts::generate_message_prompt(request)),
                ],
                None,
            )
            .await?;

        match completion.first_text() {
            Some(text) => Ok(text.to_string()),
            None => {
                warn!(kind = request.kind(), "ai.message_fallback_used");
                Ok(request.fallback_text())
            }
        }
    }
}

#[async_trait]
impl OcrEngine for AiClient {
    async fn extract_text(&self, image: &[u8], mime_type: Option<&str>) -> Result<Option<String>, PortError> {
        let completion = self
            .chat_completion(
                self.config.ocr_model(),
                vec![
                    ChatMessage::system(prompts::OCR_SYSTEM_PROMPT),
                    ChatMessage::user_with_image(prompts::OCR_USER_PROMPT, to_data_url(image, mime_type)),
                ],
                None,
            )
            .await?;

        Ok(completion.first_text().map(str::to_string))
    }
}

fn to_data_url(data: &[u8], mime_type: Option<&str>) -> String {
    format!(
        "data:{};base64,{}",
        mime_type.unwrap_or("image/jpeg"),
        STANDARD.encode(data)
    )
}

/// Parse model output as JSON, tolerating a surrounding code fence.
fn parse_json_content(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    match serde_json::from_str::<Value>(unfenced) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "ai.unparseable_json_output");
            None
        }
    }
}

/// Accept a candidate only when amount, currency, merchant and date are
/// present with the right types. Missing `rawText` falls back to the input.
fn normalize_extracted(payload: &Value, raw_input: &str) -> Option<ExtractedTransaction> {
    let record = payload.as_object()?;
    let amount = record.get("amount")?.as_f64()?;
    let currency = record.get("currency")?.as_str()?;
    let merchant = record.get("merchant")?.as_str()?;
    let date = record.get("date")?.as_str()?;

    let non_empty = |key: &str| {
        record
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Some(ExtractedTransaction {
        amount,
        currency: currency.to_string(),
        merchant: merchant.to_string(),
        date: date.to_string(),
        card_type: non_empty("cardType"),
        bank: non_empty("bank").unwrap_or_else(|| "unknown".to_string()),
        raw_text: non_empty("rawText").unwrap_or_else(|| raw_input.to_string()),
    })
}

fn normalize_classification(payload: &Value) -> Classification {
    let category_id = payload
        .get("categoryId")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let confidence = payload
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    Classification {
        category_id,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(max_input_chars: usize) -> AiClient {
        AiClient::new(
            AiClientConfig::builder()
                .api_key("test")
                .max_input_chars(max_input_chars)
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            AiClient::new(AiClientConfig::default()),
            Err(AiClientError::Configuration(_))
        ));
    }

    #[test]
    fn test_cap_input_on_char_boundary() {
        let c = client(4);
        assert_eq!(c.cap_input("ñandú"), "ñand");
        assert_eq!(c.cap_input("abc"), "abc");
    }

    #[test]
    fn test_parse_json_content() {
        assert_eq!(parse_json_content(r#"{"a":1}"#), Some(json!({"a": 1})));
        assert_eq!(parse_json_content("```json\n{\"a\":1}\n```"), Some(json!({"a": 1})));
        assert_eq!(parse_json_content("null"), None);
        assert_eq!(parse_json_content("no hay transacción"), None);
    }

    #[test]
    fn test_normalize_extracted() {
        let payload = json!({
            "amount": 50.0,
            "currency": "PEN",
            "merchant": "Tambo",
            "date": "2026-02-20",
            "bank": "",
        });
        let tx = normalize_extracted(&payload, "S/ 50 en Tambo").unwrap();
        assert_eq!(tx.amount, 50.0);
        assert_eq!(tx.bank, "unknown");
        assert_eq!(tx.raw_text, "S/ 50 en Tambo");
        assert!(tx.card_type.is_none());

        let with_raw = json!({
            "amount": 12,
            "currency": "USD",
            "merchant": "Uber",
            "date": "2026-02-20",
            "bank": "BCP",
            "cardType": "Visa",
            "rawText": "Op 123",
        });
        let tx = normalize_extracted(&with_raw, "input").unwrap();
        assert_eq!(tx.amount, 12.0);
        assert_eq!(tx.bank, "BCP");
        assert_eq!(tx.card_type.as_deref(), Some("Visa"));
        assert_eq!(tx.raw_text, "Op 123");

        assert!(normalize_extracted(&json!({"amount": "50", "currency": "PEN", "merchant": "x", "date": "d"}), "").is_none());
        assert!(normalize_extracted(&json!({"amount": 50, "currency": "PEN", "merchant": "x"}), "").is_none());
        assert!(normalize_extracted(&json!([1]), "").is_none());
    }

    #[test]
    fn test_normalize_classification() {
        let c = normalize_classification(&json!({"categoryId": "cat_food", "confidence": 0.9}));
        assert_eq!(c.category_id.as_deref(), Some("cat_food"));
        assert_eq!(c.confidence, 0.9);

        let clamped = normalize_classification(&json!({"categoryId": "cat_food", "confidence": 7}));
        assert_eq!(clamped.confidence, 1.0);

        let none = normalize_classification(&json!({"categoryId": null, "confidence": "high"}));
        assert!(none.category_id.is_none());
        assert_eq!(none.confidence, 0.0);
    }

    #[test]
    fn test_data_url() {
        assert_eq!(to_data_url(b"hi", Some("image/png")), "data:image/png;base64,aGk=");
        assert_eq!(to_data_url(b"hi", None), "data:image/jpeg;base64,aGk=");
    }

    #[tokio::test]
    async fn test_heuristic_short_circuits_model() {
        // The API URL is unreachable; a heuristic hit must not touch it.
        let c = AiClient::new(
            AiClientConfig::builder()
                .api_key("test")
                .api_url("http://127.0.0.1:9")
                .build(),
        )
        .unwrap();
        let result = c
            .classify_category("Comida", &expense_core::default_categories())
            .await
            .unwrap();
        assert_eq!(result.category_id.as_deref(), Some("cat_food"));
        assert_eq!(result.confidence, 0.99);
    }
}

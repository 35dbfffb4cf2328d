//! Fake AI ports.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use expense_core::{
    Category, CategoryClassifier, Classification, ExtractedTransaction, MessageGenerator,
    MessageRequest, OcrEngine, PortError, TransactionExtractor,
};
use tokio::sync::Mutex;

/// An extractor that always returns the same candidate.
#[derive(Debug, Default)]
pub struct StaticExtractor {
    result: Option<ExtractedTransaction>,
    inputs: Mutex<Vec<String>>,
}

impl StaticExtractor {
    /// An extractor that finds this transaction in every input.
    pub fn returning(transaction: ExtractedTransaction) -> Self {
        Self {
            result: Some(transaction),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// An extractor that never finds a transaction.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a candidate with the usual defaults.
    pub fn transaction(amount: f64, currency: &str, merchant: &str) -> ExtractedTransaction {
        ExtractedTransaction {
            amount,
            currency: currency.to_string(),
            merchant: merchant.to_string(),
            date: "2026-02-20T10:00:00.000Z".to_string(),
            card_type: None,
            bank: "unknown".to_string(),
            raw_text: String::new(),
        }
    }

    /// Every input seen so far.
    pub async fn inputs(&self) -> Vec<String> {
        self.inputs.lock().await.clone()
    }
}

#[async_trait]
impl TransactionExtractor for StaticExtractor {
    async fn extract_transaction(&self, input: &str) -> Result<Option<ExtractedTransaction>, PortError> {
        self.inputs.lock().await.push(input.to_string());
        Ok(self.result.clone())
    }
}

/// A classifier that returns a fixed answer.
#[derive(Debug)]
pub struct ScriptedClassifier {
    result: Classification,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new(result: Classification) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    /// A classifier that never recognizes the reply.
    pub fn unmatched() -> Self {
        Self::new(Classification::unmatched())
    }

    /// How many times the classifier was consulted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CategoryClassifier for ScriptedClassifier {
    async fn classify_category(
        &self,
        _reply: &str,
        _categories: &[Category],
    ) -> Result<Classification, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

/// A generator that renders the request's fallback text, optionally prefixed.
#[derive(Debug, Clone, Default)]
pub struct TemplateMessageGenerator {
    prefix: Option<String>,
}

impl TemplateMessageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

#[async_trait]
impl MessageGenerator for TemplateMessageGenerator {
    async fn generate_message(&self, request: &MessageRequest) -> Result<String, PortError> {
        let text = request.fallback_text();
        Ok(match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, text),
            None => text,
        })
    }
}

/// An OCR engine that reads the same text from every image.
#[derive(Debug, Clone, Default)]
pub struct StaticOcr {
    text: Option<String>,
}

impl StaticOcr {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// An engine that never finds text.
    pub fn blank() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OcrEngine for StaticOcr {
    async fn extract_text(&self, _image: &[u8], _mime_type: Option<&str>) -> Result<Option<String>, PortError> {
        Ok(self.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_extractor_records_inputs() {
        let extractor = StaticExtractor::returning(StaticExtractor::transaction(50.0, "PEN", "Tambo"));

        let found = extractor.extract_transaction("S/ 50 en Tambo").await.unwrap();
        assert_eq!(found.map(|t| t.merchant), Some("Tambo".to_string()));
        assert_eq!(extractor.inputs().await, vec!["S/ 50 en Tambo".to_string()]);

        let empty = StaticExtractor::empty();
        assert!(empty.extract_transaction("hola").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scripted_classifier_counts_calls() {
        let classifier = ScriptedClassifier::new(Classification::matched("cat_food", 0.9));
        let result = classifier.classify_category("comida", &[]).await.unwrap();

        assert_eq!(result.category_id.as_deref(), Some("cat_food"));
        assert_eq!(classifier.calls(), 1);
    }

    #[tokio::test]
    async fn test_template_generator() {
        let generator = TemplateMessageGenerator::with_prefix("[bot] ");
        let text = generator
            .generate_message(&MessageRequest::Confirmation {
                category_name: "Comida".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(text, "[bot] Listo, ya lo guardé en Comida.");
    }

    #[tokio::test]
    async fn test_static_ocr() {
        assert_eq!(
            StaticOcr::new("TOTAL 12.50").extract_text(b"img", None).await.unwrap(),
            Some("TOTAL 12.50".to_string())
        );
        assert!(StaticOcr::blank().extract_text(b"img", None).await.unwrap().is_none());
    }
}

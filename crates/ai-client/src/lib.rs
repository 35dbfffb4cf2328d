//! Model-backed implementations of the AI ports.
//!
//! [`AiClient`] talks to any OpenAI-compatible chat-completions endpoint and
//! implements [`TransactionExtractor`], [`CategoryClassifier`],
//! [`MessageGenerator`] and [`OcrEngine`]:
//!
//! - Extraction asks for JSON matching a transaction schema; output that does
//!   not carry amount, currency, merchant and date is treated as "no
//!   transaction".
//! - Classification tries the name/slug heuristic before calling the model.
//! - Message generation falls back to fixed Spanish templates when the model
//!   returns nothing usable.
//! - OCR sends the image inline as a base64 data URL to a vision model.
//!
//! ```rust,no_run
//! use ai_client::AiClient;
//! use expense_core::TransactionExtractor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AiClient::from_env()?;
//! let tx = client.extract_transaction("Consumo S/ 50.00 en TAMBO").await?;
//! println!("{:?}", tx);
//! # Ok(())
//! # }
//! ```
//!
//! [`TransactionExtractor`]: expense_core::TransactionExtractor
//! [`CategoryClassifier`]: expense_core::CategoryClassifier
//! [`MessageGenerator`]: expense_core::MessageGenerator
//! [`OcrEngine`]: expense_core::OcrEngine

mod api_types;
mod client;
mod config;
mod error;
mod prompts;

pub use client::AiClient;
pub use config::{AiClientConfig, AiClientConfigBuilder, DEFAULT_API_URL, DEFAULT_MAX_INPUT_CHARS, DEFAULT_MODEL};
pub use error::AiClientError;

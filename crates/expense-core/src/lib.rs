//! Core domain types and port traits for gastos.
//!
//! This crate is the shared vocabulary between the persistence layer, the
//! pipeline and the provider adapters. It defines:
//!
//! - [`IncomingMessage`] / [`IncomingAttachment`] - normalized inbound chat messages
//! - [`ExtractedTransaction`] - the structured candidate produced by an extractor
//! - [`Category`] / [`Classification`] - categories and classifier output
//! - Port traits for every external collaborator: [`TransactionExtractor`],
//!   [`CategoryClassifier`], [`MessageGenerator`], [`OcrEngine`],
//!   [`ChannelTransport`] and [`ObjectStore`]
//! - [`PortError`] - the error type every port returns
//!
//! # Example
//!
//! ```rust
//! use expense_core::{async_trait, Category, CategoryClassifier, Classification, PortError};
//!
//! struct AlwaysFood;
//!
//! #[async_trait]
//! impl CategoryClassifier for AlwaysFood {
//!     async fn classify_category(
//!         &self,
//!         _reply: &str,
//!         _categories: &[Category],
//!     ) -> Result<Classification, PortError> {
//!         Ok(Classification::matched("cat_food", 0.9))
//!     }
//! }
//! ```

mod category;
mod currency;
mod error;
mod message;
mod ports;
mod transaction;

pub use category::{default_categories, heuristic_match, Category, Classification};
pub use currency::{currency_symbol, normalize_currency};
pub use error::PortError;
pub use message::{AttachmentKind, IncomingAttachment, IncomingMessage, MediaPayload, SentMessage};
pub use ports::{
    CategoryClassifier, ChannelTransport, MessageGenerator, MessageRequest, ObjectStore, OcrEngine,
    TransactionExtractor,
};
pub use transaction::{validate_candidate, CandidateRejection, ExtractedTransaction};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

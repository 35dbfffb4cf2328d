//! In-memory port implementations for testing the expense flow.
//!
//! This crate provides fakes for every port in `expense-core`:
//! - `StaticExtractor` - Returns a fixed transaction (or none)
//! - `ScriptedClassifier` - Returns a fixed classification and records replies
//! - `TemplateMessageGenerator` - Deterministic messages built from the request
//! - `StaticOcr` - Returns fixed OCR text
//! - `RecordingTransport` - Records outbound messages, optionally failing
//! - `MemoryObjectStore` - Keeps objects in a map
//!
//! For production adapters, use the `ai-client` and `channels` crates instead.
//!
//! # Example
//!
//! ```rust
//! use mock_ports::{ChannelTransport, RecordingTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_ports::PortError> {
//!     let transport = RecordingTransport::new("whatsapp");
//!
//!     transport.send_message("51999", "Hola").await?;
//!     assert_eq!(transport.sent().await, vec![("51999".to_string(), "Hola".to_string())]);
//!     Ok(())
//! }
//! ```

mod ai;
mod store;
mod transport;

pub use expense_core::{
    async_trait, CategoryClassifier, ChannelTransport, Classification, ExtractedTransaction,
    MessageGenerator, MessageRequest, ObjectStore, OcrEngine, PortError, TransactionExtractor,
};

pub use ai::{ScriptedClassifier, StaticExtractor, StaticOcr, TemplateMessageGenerator};
pub use store::MemoryObjectStore;
pub use transport::RecordingTransport;

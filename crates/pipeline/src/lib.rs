//! Expense ingestion, reply resolution and chat routing.
//!
//! This crate holds the conversational core of gastos. Every external
//! collaborator (AI, OCR, channel transport, object store) is injected as an
//! `expense-core` port, so the same flow serves WhatsApp, Telegram and email.
//!
//! # Architecture
//!
//! ```text
//! Inbound message (webhook, already claimed in the ledger)
//!          ↓
//! ┌──────────────────────────────────────────────────────────┐
//! │                       CHAT ROUTER                        │
//! │                                                          │
//! │  open question?                                          │
//! │    yes, text   → Reply Resolution                        │
//! │                    heuristic → classifier → gate         │
//! │                    → mark CATEGORIZED → confirm          │
//! │    yes, no text → guidance (images are not a reply)      │
//! │    no          → OCR images, store media                 │
//! │                  → Ingestion                             │
//! │                    extract → validate → persist          │
//! │                    → open question → ask category        │
//! │                  → link media to the expense             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Channel authorization is re-checked right before every outbound message.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pipeline::{AiPorts, ChatRouter, ExpenseFlow, MediaArchive, PipelineConfig};
//!
//! let config = PipelineConfig::from_env();
//! let flow = Arc::new(ExpenseFlow::new(db.clone(), ai_ports, config.clone()));
//! let media = MediaArchive::new(db, object_store, config.media_retention_days);
//! let router = ChatRouter::new(flow, ocr, media);
//!
//! let outcome = router.route("cust_1", &message, "evt_1", &transport).await?;
//! ```

mod authorize;
mod config;
mod conversation;
mod error;
mod flow;
mod media;
mod router;

pub use authorize::{ChannelAuthorizer, FREE_PLAN_ID};
pub use config::{PipelineConfig, DEFAULT_CONFIDENCE_THRESHOLD};
pub use conversation::ConversationStore;
pub use error::PipelineError;
pub use flow::{AiPorts, ExpenseFlow, ReplyOutcome, CLARIFY_CATEGORY_MESSAGE};
pub use media::{image_extension, MediaArchive, MediaOrigin, SweepReport, DEFAULT_SWEEP_LIMIT};
pub use router::{ChatRouter, RouteOutcome, GUIDANCE_MESSAGE};

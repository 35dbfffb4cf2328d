//! Error types for pipeline operations.

use database::DatabaseError;
use expense_core::{CandidateRejection, PortError};
use thiserror::Error;

/// Errors that can occur while ingesting, resolving or routing a message.
///
/// One variant per failure cause. Store failures carry the operation that
/// failed so the ledger and logs can say exactly what broke.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The extractor port failed.
    #[error("transaction extraction failed: {0}")]
    Extraction(#[source] PortError),

    /// The message generator port failed.
    #[error("message generation failed: {0}")]
    MessageGeneration(#[source] PortError),

    /// The classifier port failed.
    #[error("category classification failed: {0}")]
    Classification(#[source] PortError),

    /// The OCR port (or fetching the image for it) failed.
    #[error("ocr extraction failed: {0}")]
    Ocr(#[source] PortError),

    /// Sending a message on the channel failed.
    #[error("channel send failed: {0}")]
    ChannelSend(#[source] PortError),

    #[error("expense persistence failed during {op}: {source}")]
    ExpensePersistence {
        op: &'static str,
        #[source]
        source: DatabaseError,
    },

    #[error("category lookup failed during {op}: {source}")]
    CategoryLookup {
        op: &'static str,
        #[source]
        source: DatabaseError,
    },

    #[error("conversation state failed during {op}: {source}")]
    ConversationState {
        op: &'static str,
        #[source]
        source: DatabaseError,
    },

    #[error("chat media persistence failed during {op}: {source}")]
    MediaPersistence {
        op: &'static str,
        #[source]
        source: DatabaseError,
    },

    /// Writing or deleting a media payload in the object store failed.
    #[error("object store failed: {0}")]
    ObjectStore(#[source] PortError),

    #[error("channel policy lookup failed during {op}: {source}")]
    ChannelPolicy {
        op: &'static str,
        #[source]
        source: DatabaseError,
    },

    #[error("feature policy lookup failed for {feature_key}: {source}")]
    FeaturePolicy {
        feature_key: String,
        #[source]
        source: DatabaseError,
    },

    /// The channel is globally off, or switched off for this customer.
    #[error("channel {channel} is disabled for customer {customer_id}")]
    ChannelDisabled { customer_id: String, channel: String },

    /// Strict policy mode and the customer was never provisioned on the channel.
    #[error("customer {customer_id} has no setting for channel {channel}")]
    ChannelSettingMissing { customer_id: String, channel: String },

    /// The customer's plan does not include the channel.
    #[error("feature {feature_key} is not enabled for customer {customer_id}")]
    FeatureBlocked {
        customer_id: String,
        feature_key: String,
    },

    /// The extractor returned a candidate that cannot become an expense.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(CandidateRejection),
}

impl PipelineError {
    /// Stable code used in logs and in the ledger's last error.
    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::Extraction(_) => "AI_EXTRACT_FAILED",
            PipelineError::MessageGeneration(_) => "AI_MESSAGE_GENERATION_FAILED",
            PipelineError::Classification(_) => "CATEGORY_CLASSIFICATION_FAILED",
            PipelineError::Ocr(_) => "OCR_EXTRACTION_FAILED",
            PipelineError::ChannelSend(_) => "CHANNEL_SEND_FAILED",
            PipelineError::ExpensePersistence { .. } => "EXPENSE_PERSISTENCE_FAILED",
            PipelineError::CategoryLookup { .. } => "CATEGORY_LOOKUP_FAILED",
            PipelineError::ConversationState { .. } => "CONVERSATION_STATE_FAILED",
            PipelineError::MediaPersistence { .. } | PipelineError::ObjectStore(_) => {
                "CHAT_MEDIA_PERSISTENCE_FAILED"
            }
            PipelineError::ChannelPolicy { .. } => "CHANNEL_POLICY_FAILED",
            PipelineError::FeaturePolicy { .. } => "FEATURE_POLICY_FAILED",
            PipelineError::ChannelDisabled { .. } => "CHANNEL_DISABLED",
            PipelineError::ChannelSettingMissing { .. } => "CHANNEL_SETTING_MISSING",
            PipelineError::FeatureBlocked { .. } => "SUBSCRIPTION_FEATURE_BLOCKED",
            PipelineError::InvalidTransaction(_) => "INVALID_TRANSACTION",
        }
    }

    /// Whether this is an expected access decision rather than a failure.
    pub fn is_policy_denial(&self) -> bool {
        matches!(
            self,
            PipelineError::ChannelDisabled { .. }
                | PipelineError::ChannelSettingMissing { .. }
                | PipelineError::FeatureBlocked { .. }
        )
    }

    /// Whether the channel provider rejected a send with a rate limit.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PipelineError::ChannelSend(e) if e.is_rate_limited())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_denials() {
        let disabled = PipelineError::ChannelDisabled {
            customer_id: "cust_1".to_string(),
            channel: "whatsapp".to_string(),
        };
        assert!(disabled.is_policy_denial());
        assert_eq!(disabled.error_code(), "CHANNEL_DISABLED");

        let blocked = PipelineError::FeatureBlocked {
            customer_id: "cust_1".to_string(),
            feature_key: "channels.telegram".to_string(),
        };
        assert!(blocked.is_policy_denial());
        assert_eq!(
            blocked.to_string(),
            "feature channels.telegram is not enabled for customer cust_1"
        );

        let send = PipelineError::ChannelSend(PortError::Unavailable("down".to_string()));
        assert!(!send.is_policy_denial());
        assert!(!send.is_rate_limited());
    }

    #[test]
    fn test_rate_limited_send() {
        let err = PipelineError::ChannelSend(PortError::RateLimited("slow down".to_string()));
        assert!(err.is_rate_limited());
        assert_eq!(err.error_code(), "CHANNEL_SEND_FAILED");
    }

    #[test]
    fn test_invalid_transaction_message() {
        let err = PipelineError::InvalidTransaction(CandidateRejection::Amount(-1.0));
        assert_eq!(err.error_code(), "INVALID_TRANSACTION");
        assert_eq!(err.to_string(), "invalid transaction: invalid amount: -1");
    }
}

//! TTL-bound store for the one open question per conversation.

use std::time::Duration;

use chrono::Utc;
use database::clock::{format_timestamp, offset_by};
use database::{conversation_state, ConversationState, Database};

use crate::error::PipelineError;

/// Conversation state keyed by (customer, channel, user).
///
/// Writing always replaces. Expired entries read as absent.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    db: Database,
    ttl: Duration,
}

impl ConversationStore {
    pub fn new(db: Database, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    /// Open a question about `expense_id`, replacing any previous one.
    pub async fn put(
        &self,
        customer_id: &str,
        channel: &str,
        user_id: &str,
        expense_id: &str,
    ) -> Result<ConversationState, PipelineError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let state = ConversationState {
            customer_id: customer_id.to_string(),
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            expense_id: expense_id.to_string(),
            created_at: format_timestamp(now),
            expires_at: format_timestamp(offset_by(now, ttl)),
        };

        conversation_state::put_state(self.db.pool(), &state)
            .await
            .map_err(|source| PipelineError::ConversationState { op: "put", source })?;

        Ok(state)
    }

    pub async fn get(
        &self,
        customer_id: &str,
        channel: &str,
        user_id: &str,
    ) -> Result<Option<ConversationState>, PipelineError> {
        conversation_state::get_state(self.db.pool(), customer_id, channel, user_id)
            .await
            .map_err(|source| PipelineError::ConversationState { op: "get", source })
    }

    pub async fn delete(&self, customer_id: &str, channel: &str, user_id: &str) -> Result<(), PipelineError> {
        conversation_state::delete_state(self.db.pool(), customer_id, channel, user_id)
            .await
            .map_err(|source| PipelineError::ConversationState { op: "delete", source })?;
        Ok(())
    }
}

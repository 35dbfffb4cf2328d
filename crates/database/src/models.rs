//! Database models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Ledger status of a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookEventStatus {
    Processing,
    Processed,
    Failed,
}

impl WebhookEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventStatus::Processing => "PROCESSING",
            WebhookEventStatus::Processed => "PROCESSED",
            WebhookEventStatus::Failed => "FAILED",
        }
    }
}

/// Outcome of trying to claim a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyStatus {
    /// First time this event is seen. The caller owns it.
    New,
    /// Another delivery of this event is being handled right now.
    DuplicateInflight,
    /// This event was already handled. Skip all side effects.
    DuplicateProcessed,
    /// A previously failed event was reclaimed. The caller owns it.
    RetryAllowed,
}

impl IdempotencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdempotencyStatus::New => "NEW",
            IdempotencyStatus::DuplicateInflight => "DUPLICATE_INFLIGHT",
            IdempotencyStatus::DuplicateProcessed => "DUPLICATE_PROCESSED",
            IdempotencyStatus::RetryAllowed => "RETRY_ALLOWED",
        }
    }

    /// Whether the caller won the claim and must process the event.
    pub fn should_process(&self) -> bool {
        matches!(self, IdempotencyStatus::New | IdempotencyStatus::RetryAllowed)
    }
}

/// A row of the webhook idempotency ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct WebhookEvent {
    /// Provider name, e.g. `kapso_whatsapp`.
    pub provider: String,
    /// Provider event id, or `hash:<sha256>` when the provider gives none.
    pub event_id: String,
    pub status: WebhookEventStatus,
    /// Fingerprint of the most recent payload.
    pub payload_hash: String,
    /// Correlation id of the most recent delivery.
    pub request_id: Option<String>,
    pub attempt_count: i64,
    pub first_seen_at: String,
    pub last_seen_at: String,
    pub processed_at: Option<String>,
    pub last_error: Option<String>,
}

/// An open question awaiting the user's category reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ConversationState {
    pub customer_id: String,
    pub channel: String,
    pub user_id: String,
    /// Expense awaiting a category.
    pub expense_id: String,
    pub created_at: String,
    pub expires_at: String,
}

/// Lifecycle of an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    PendingCategory,
    Categorized,
    /// Reserved; nothing in the categorization flow sets it.
    Discarded,
}

/// A recorded expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub id: String,
    pub customer_id: String,
    pub amount: f64,
    /// ISO-like currency code.
    pub currency: String,
    pub merchant: String,
    pub occurred_at: String,
    /// Bank or source label.
    pub bank: String,
    /// Source text the expense was extracted from.
    pub raw_text: String,
    pub status: ExpenseStatus,
    pub category_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a pending expense.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub customer_id: String,
    pub amount: f64,
    pub currency: String,
    pub merchant: String,
    pub occurred_at: String,
    pub bank: String,
    pub raw_text: String,
}

/// An audit record for an expense mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ExpenseEvent {
    pub id: String,
    pub customer_id: String,
    pub expense_id: String,
    #[sqlx(rename = "type")]
    pub event_type: String,
    pub payload_json: String,
    pub created_at: String,
}

/// A stored category row. `customer_id` is `None` for global categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CategoryRecord {
    pub id: String,
    pub customer_id: Option<String>,
    pub name: String,
    pub slug: String,
}

impl From<CategoryRecord> for expense_core::Category {
    fn from(record: CategoryRecord) -> Self {
        expense_core::Category::new(record.id, record.name, record.slug)
    }
}

/// A messaging channel, globally switched on or off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Channel {
    pub id: String,
    pub name: String,
    /// `ACTIVE` or `INACTIVE`.
    pub status: String,
}

impl Channel {
    pub fn is_active(&self) -> bool {
        self.status == "ACTIVE"
    }
}

/// A customer's explicit opt-in for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CustomerChannelSetting {
    pub id: String,
    pub customer_id: String,
    pub channel_id: String,
    pub enabled: bool,
    pub is_primary: bool,
    pub config_json: Option<String>,
}

/// A subscription plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub price_amount: f64,
    pub price_currency: String,
    /// `monthly`, `yearly` or `none`.
    pub billing_interval: String,
    /// `ACTIVE` or `INACTIVE`.
    pub status: String,
    pub version: i64,
}

impl Plan {
    pub fn is_active(&self) -> bool {
        self.status == "ACTIVE"
    }
}

/// A customer's subscription to a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CustomerSubscription {
    pub id: String,
    pub customer_id: String,
    pub plan_id: String,
    /// `TRIALING`, `ACTIVE`, `PAST_DUE`, `CANCELED` or `EXPIRED`.
    pub status: String,
    pub start_at: String,
    pub current_period_start: String,
    pub current_period_end: String,
    pub cancel_at_period_end: bool,
    pub provider: String,
    pub provider_subscription_id: Option<String>,
}

/// A feature entitlement attached to a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlanFeature {
    pub plan_id: String,
    pub feature_key: String,
    /// `boolean` or `limit`.
    pub feature_type: String,
    pub bool_value: Option<i64>,
    pub limit_value: Option<i64>,
}

impl PlanFeature {
    /// Boolean features are on when set to 1; limit features when the limit is positive.
    pub fn is_enabled(&self) -> bool {
        if self.feature_type == "boolean" {
            self.bool_value == Some(1)
        } else {
            self.limit_value.unwrap_or(0) > 0
        }
    }
}

/// A customer account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub status: String,
    pub default_currency: String,
    pub timezone: String,
    pub locale: String,
    /// Per-customer confidence gate, overriding the global default when set.
    pub confidence_threshold: Option<f64>,
}

/// Mapping from a provider user id to a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CustomerChannel {
    pub id: String,
    pub customer_id: String,
    pub channel: String,
    pub external_user_id: String,
    pub is_primary: bool,
}

/// Index row for a stored receipt image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatMedia {
    pub id: String,
    pub customer_id: String,
    pub channel: String,
    pub external_user_id: String,
    pub provider_event_id: String,
    pub expense_id: Option<String>,
    /// Key of the payload in the object store.
    pub object_key: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    /// SHA-256 hex of the payload.
    pub sha256: String,
    pub ocr_text: Option<String>,
    pub created_at: String,
    pub expires_at: String,
}

/// Input for indexing a stored receipt image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatMedia {
    pub customer_id: String,
    pub channel: String,
    pub external_user_id: String,
    pub provider_event_id: String,
    pub object_key: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub sha256: String,
    pub ocr_text: Option<String>,
    pub created_at: String,
    pub expires_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(feature_type: &str, bool_value: Option<i64>, limit_value: Option<i64>) -> PlanFeature {
        PlanFeature {
            plan_id: "free".to_string(),
            feature_key: "channels.whatsapp".to_string(),
            feature_type: feature_type.to_string(),
            bool_value,
            limit_value,
        }
    }

    #[test]
    fn test_plan_feature_enabled() {
        assert!(feature("boolean", Some(1), None).is_enabled());
        assert!(!feature("boolean", Some(0), None).is_enabled());
        assert!(!feature("boolean", None, Some(5)).is_enabled());
        assert!(feature("limit", None, Some(3)).is_enabled());
        assert!(!feature("limit", None, Some(0)).is_enabled());
        assert!(!feature("limit", None, None).is_enabled());
    }

    #[test]
    fn test_idempotency_status() {
        assert!(IdempotencyStatus::New.should_process());
        assert!(IdempotencyStatus::RetryAllowed.should_process());
        assert!(!IdempotencyStatus::DuplicateInflight.should_process());
        assert!(!IdempotencyStatus::DuplicateProcessed.should_process());
        assert_eq!(IdempotencyStatus::DuplicateProcessed.as_str(), "DUPLICATE_PROCESSED");
    }
}

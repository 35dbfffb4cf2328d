//! Idempotency ledger calls shared by the webhook handlers.

use database::{webhook_event, Database, IdempotencyStatus};
use tracing::{error, info};

use crate::error::ApiError;

pub const WHATSAPP_PROVIDER: &str = "kapso_whatsapp";
pub const TELEGRAM_PROVIDER: &str = "telegram_chat_sdk";
pub const EMAIL_PROVIDER: &str = "email_inbound";

/// Every provider whose ledger rows the sweep cleans up.
pub const PROVIDERS: [&str; 3] = [WHATSAPP_PROVIDER, TELEGRAM_PROVIDER, EMAIL_PROVIDER];

/// Event id for a delivery: the provider's id, else a hash of the payload.
pub fn event_id_for(provider_event_id: Option<&str>, payload_hash: Option<&str>) -> String {
    match (provider_event_id, payload_hash) {
        (Some(id), _) if !id.is_empty() => id.to_string(),
        (_, Some(hash)) => format!("hash:{}", hash),
        _ => format!("uuid:{}", uuid::Uuid::new_v4()),
    }
}

/// Claim a delivery.
pub async fn claim(
    db: &Database,
    provider: &'static str,
    event_id: &str,
    payload_hash: &str,
    request_id: &str,
) -> Result<IdempotencyStatus, ApiError> {
    let status = webhook_event::try_start_processing(db.pool(), provider, event_id, payload_hash, Some(request_id))
        .await
        .map_err(|e| {
            error!(provider, event_id, request_id, error = %e, "webhook.idempotency_claim_failed");
            ApiError::Database(e)
        })?;

    info!(provider, event_id, request_id, status = status.as_str(), "webhook.idempotency_started");
    Ok(status)
}

/// Mark a claimed delivery done.
pub async fn processed(db: &Database, provider: &'static str, event_id: &str, request_id: &str) -> Result<(), ApiError> {
    webhook_event::mark_processed(db.pool(), provider, event_id).await?;
    info!(provider, event_id, request_id, "webhook.idempotency_processed");
    Ok(())
}

/// Mark a claimed delivery failed so the provider's retry can reclaim it.
/// A ledger failure here is logged and otherwise ignored.
pub async fn failed(db: &Database, provider: &'static str, event_id: &str, request_id: &str, err: &ApiError) {
    let message = format!("{}: {}", err.code(), err);
    if let Err(e) = webhook_event::mark_failed(db.pool(), provider, event_id, &message).await {
        error!(provider, event_id, request_id, error = %e, "webhook.idempotency_mark_failed_failed");
        return;
    }
    error!(provider, event_id, request_id, code = err.code(), "webhook.idempotency_failed");
}

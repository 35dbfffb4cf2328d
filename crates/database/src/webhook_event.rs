//! Webhook idempotency ledger.
//!
//! Every inbound provider event is claimed here before any side effect runs.
//! The `(provider, event_id)` primary key is the only synchronization point
//! between overlapping deliveries of the same event: the insert decides the
//! first winner, and a status-guarded update decides who may retry a failed
//! event.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::clock::{days_from, now_timestamp};
use crate::error::{DatabaseError, Result};
use crate::models::{IdempotencyStatus, WebhookEvent, WebhookEventStatus};

/// Maximum stored length of `last_error`, in characters.
pub const MAX_ERROR_CHARS: usize = 2000;

/// Claim attempts before giving up on a row that keeps vanishing.
const CLAIM_ATTEMPTS: usize = 2;

/// Try to claim an event for processing.
///
/// Returns [`IdempotencyStatus::New`] or [`IdempotencyStatus::RetryAllowed`]
/// when the caller owns the event, and a duplicate status when it must skip.
pub async fn try_start_processing(
    pool: &SqlitePool,
    provider: &str,
    event_id: &str,
    payload_hash: &str,
    request_id: Option<&str>,
) -> Result<IdempotencyStatus> {
    for _ in 0..CLAIM_ATTEMPTS {
        let now = now_timestamp();

        let inserted = sqlx::query(
            r#"
            INSERT INTO webhook_events (
                provider, event_id, status, payload_hash, request_id,
                attempt_count, first_seen_at, last_seen_at
            )
            VALUES (?, ?, 'PROCESSING', ?, ?, 1, ?, ?)
            "#,
        )
        .bind(provider)
        .bind(event_id)
        .bind(payload_hash)
        .bind(request_id)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await;

        match inserted {
            Ok(_) => return Ok(IdempotencyStatus::New),
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {}
            Err(e) => return Err(DatabaseError::Sqlx(e)),
        }

        let Some(existing) = get_event(pool, provider, event_id).await? else {
            // Swept between the insert and the read; claim again.
            continue;
        };

        return match existing.status {
            WebhookEventStatus::Processed => {
                touch(pool, provider, event_id, request_id, &now).await?;
                Ok(IdempotencyStatus::DuplicateProcessed)
            }
            WebhookEventStatus::Processing => {
                touch(pool, provider, event_id, request_id, &now).await?;
                Ok(IdempotencyStatus::DuplicateInflight)
            }
            WebhookEventStatus::Failed => {
                let result = sqlx::query(
                    r#"
                    UPDATE webhook_events
                    SET status = 'PROCESSING',
                        payload_hash = ?,
                        request_id = COALESCE(?, request_id),
                        attempt_count = attempt_count + 1,
                        last_seen_at = ?,
                        last_error = NULL
                    WHERE provider = ? AND event_id = ? AND status = 'FAILED'
                    "#,
                )
                .bind(payload_hash)
                .bind(request_id)
                .bind(&now)
                .bind(provider)
                .bind(event_id)
                .execute(pool)
                .await?;

                if result.rows_affected() > 0 {
                    Ok(IdempotencyStatus::RetryAllowed)
                } else {
                    // Another delivery reclaimed it first.
                    Ok(IdempotencyStatus::DuplicateInflight)
                }
            }
        };
    }

    Err(DatabaseError::NotFound {
        entity: "WebhookEvent",
        id: format!("{}:{}", provider, event_id),
    })
}

async fn touch(
    pool: &SqlitePool,
    provider: &str,
    event_id: &str,
    request_id: Option<&str>,
    now: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE webhook_events
        SET last_seen_at = ?, request_id = COALESCE(?, request_id)
        WHERE provider = ? AND event_id = ?
        "#,
    )
    .bind(now)
    .bind(request_id)
    .bind(provider)
    .bind(event_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Mark a claimed event as fully processed.
pub async fn mark_processed(pool: &SqlitePool, provider: &str, event_id: &str) -> Result<()> {
    let now = now_timestamp();
    let result = sqlx::query(
        r#"
        UPDATE webhook_events
        SET status = 'PROCESSED', processed_at = ?, last_seen_at = ?, last_error = NULL
        WHERE provider = ? AND event_id = ?
        "#,
    )
    .bind(&now)
    .bind(&now)
    .bind(provider)
    .bind(event_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "WebhookEvent",
            id: format!("{}:{}", provider, event_id),
        });
    }

    Ok(())
}

/// Mark a claimed event as failed so a later delivery may retry it.
pub async fn mark_failed(
    pool: &SqlitePool,
    provider: &str,
    event_id: &str,
    message: &str,
) -> Result<()> {
    let now = now_timestamp();
    let truncated: String = message.chars().take(MAX_ERROR_CHARS).collect();

    let result = sqlx::query(
        r#"
        UPDATE webhook_events
        SET status = 'FAILED', last_error = ?, last_seen_at = ?
        WHERE provider = ? AND event_id = ?
        "#,
    )
    .bind(truncated)
    .bind(&now)
    .bind(provider)
    .bind(event_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "WebhookEvent",
            id: format!("{}:{}", provider, event_id),
        });
    }

    Ok(())
}

/// Delete ledger rows for a provider not seen within the retention window.
pub async fn cleanup_old(pool: &SqlitePool, provider: &str, retention_days: i64) -> Result<u64> {
    let threshold = days_from(Utc::now(), retention_days.saturating_neg());
    let result = sqlx::query(
        r#"
        DELETE FROM webhook_events
        WHERE provider = ? AND last_seen_at < ?
        "#,
    )
    .bind(provider)
    .bind(threshold)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Get a ledger row.
pub async fn get_event(
    pool: &SqlitePool,
    provider: &str,
    event_id: &str,
) -> Result<Option<WebhookEvent>> {
    let record = sqlx::query_as::<_, WebhookEvent>(
        r#"
        SELECT provider, event_id, status, payload_hash, request_id, attempt_count,
               first_seen_at, last_seen_at, processed_at, last_error
        FROM webhook_events
        WHERE provider = ? AND event_id = ?
        "#,
    )
    .bind(provider)
    .bind(event_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

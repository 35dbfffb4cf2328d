//! Index of stored receipt images.
//!
//! Payloads live in an object store; this table tracks where they are, what
//! OCR saw in them, which expense they led to, and when they expire.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{ChatMedia, NewChatMedia};

/// Index a stored receipt image.
pub async fn create(pool: &SqlitePool, input: &NewChatMedia) -> Result<ChatMedia> {
    let media = ChatMedia {
        id: Uuid::new_v4().to_string(),
        customer_id: input.customer_id.clone(),
        channel: input.channel.clone(),
        external_user_id: input.external_user_id.clone(),
        provider_event_id: input.provider_event_id.clone(),
        expense_id: None,
        object_key: input.object_key.clone(),
        mime_type: input.mime_type.clone(),
        size_bytes: input.size_bytes,
        sha256: input.sha256.clone(),
        ocr_text: input.ocr_text.clone(),
        created_at: input.created_at.clone(),
        expires_at: input.expires_at.clone(),
    };

    sqlx::query(
        r#"
        INSERT INTO chat_media (
            id, customer_id, channel, external_user_id, provider_event_id, expense_id,
            object_key, mime_type, size_bytes, sha256, ocr_text, created_at, expires_at
        )
        VALUES (?, ?, ?, ?, ?, NULL, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&media.id)
    .bind(&media.customer_id)
    .bind(&media.channel)
    .bind(&media.external_user_id)
    .bind(&media.provider_event_id)
    .bind(&media.object_key)
    .bind(&media.mime_type)
    .bind(media.size_bytes)
    .bind(&media.sha256)
    .bind(&media.ocr_text)
    .bind(&media.created_at)
    .bind(&media.expires_at)
    .execute(pool)
    .await?;

    Ok(media)
}

/// Point a media row at the expense it produced.
pub async fn link_expense(pool: &SqlitePool, media_id: &str, expense_id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE chat_media
        SET expense_id = ?
        WHERE id = ?
        "#,
    )
    .bind(expense_id)
    .bind(media_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "ChatMedia",
            id: media_id.to_string(),
        });
    }

    Ok(())
}

/// Media rows whose retention ran out at `now`, oldest first.
pub async fn list_expired(pool: &SqlitePool, now: &str, limit: i64) -> Result<Vec<ChatMedia>> {
    let records = sqlx::query_as::<_, ChatMedia>(
        r#"
        SELECT id, customer_id, channel, external_user_id, provider_event_id, expense_id,
               object_key, mime_type, size_bytes, sha256, ocr_text, created_at, expires_at
        FROM chat_media
        WHERE expires_at <= ?
        ORDER BY expires_at ASC
        LIMIT ?
        "#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Media rows linked to an expense.
pub async fn list_for_expense(pool: &SqlitePool, expense_id: &str) -> Result<Vec<ChatMedia>> {
    let records = sqlx::query_as::<_, ChatMedia>(
        r#"
        SELECT id, customer_id, channel, external_user_id, provider_event_id, expense_id,
               object_key, mime_type, size_bytes, sha256, ocr_text, created_at, expires_at
        FROM chat_media
        WHERE expense_id = ?
        ORDER BY object_key ASC
        "#,
    )
    .bind(expense_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Delete a media row by ID.
pub async fn delete_by_id(pool: &SqlitePool, media_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM chat_media
        WHERE id = ?
        "#,
    )
    .bind(media_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

//! Global channel switches and per-customer channel settings.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{Channel, CustomerChannelSetting};
use crate::Result;

/// Get a channel by ID.
pub async fn get_channel(pool: &SqlitePool, channel_id: &str) -> Result<Option<Channel>> {
    let record = sqlx::query_as::<_, Channel>(
        r#"
        SELECT id, name, status
        FROM channels
        WHERE id = ?
        "#,
    )
    .bind(channel_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Create or update a channel.
pub async fn upsert_channel(pool: &SqlitePool, channel: &Channel) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO channels (id, name, status)
        VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            status = excluded.status
        "#,
    )
    .bind(&channel.id)
    .bind(&channel.name)
    .bind(&channel.status)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a customer's setting for a channel.
pub async fn get_customer_channel_setting(
    pool: &SqlitePool,
    customer_id: &str,
    channel_id: &str,
) -> Result<Option<CustomerChannelSetting>> {
    let record = sqlx::query_as::<_, CustomerChannelSetting>(
        r#"
        SELECT id, customer_id, channel_id, enabled, is_primary, config_json
        FROM customer_channel_settings
        WHERE customer_id = ? AND channel_id = ?
        "#,
    )
    .bind(customer_id)
    .bind(channel_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Create or update a customer's setting for a channel.
pub async fn upsert_customer_channel_setting(
    pool: &SqlitePool,
    customer_id: &str,
    channel_id: &str,
    enabled: bool,
    is_primary: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO customer_channel_settings (id, customer_id, channel_id, enabled, is_primary)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(customer_id, channel_id) DO UPDATE SET
            enabled = excluded.enabled,
            is_primary = excluded.is_primary
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(customer_id)
    .bind(channel_id)
    .bind(enabled)
    .bind(is_primary)
    .execute(pool)
    .await?;

    Ok(())
}

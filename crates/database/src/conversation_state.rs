//! Pending conversation state persistence.
//!
//! One row per `(customer, channel, user)`, addressed by a composite string
//! key. Rows carry an expiry; expired rows read as absent and are purged by
//! the sweep.

use sqlx::SqlitePool;

use crate::clock::now_timestamp;
use crate::models::ConversationState;
use crate::Result;

/// Build the composite key for a conversation.
pub fn state_key(customer_id: &str, channel: &str, user_id: &str) -> String {
    format!("conv:{}:{}:{}", customer_id, channel, user_id)
}

/// Create or replace the state for a conversation.
pub async fn put_state(pool: &SqlitePool, state: &ConversationState) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO conversation_states (
            state_key, customer_id, channel, user_id, expense_id, created_at, expires_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(state_key) DO UPDATE SET
            expense_id = excluded.expense_id,
            created_at = excluded.created_at,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(state_key(&state.customer_id, &state.channel, &state.user_id))
    .bind(&state.customer_id)
    .bind(&state.channel)
    .bind(&state.user_id)
    .bind(&state.expense_id)
    .bind(&state.created_at)
    .bind(&state.expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the live state for a conversation, ignoring expired rows.
pub async fn get_state(
    pool: &SqlitePool,
    customer_id: &str,
    channel: &str,
    user_id: &str,
) -> Result<Option<ConversationState>> {
    let record = sqlx::query_as::<_, ConversationState>(
        r#"
        SELECT customer_id, channel, user_id, expense_id, created_at, expires_at
        FROM conversation_states
        WHERE state_key = ? AND expires_at > ?
        "#,
    )
    .bind(state_key(customer_id, channel, user_id))
    .bind(now_timestamp())
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Delete the state for a conversation. Deleting a missing state succeeds.
pub async fn delete_state(
    pool: &SqlitePool,
    customer_id: &str,
    channel: &str,
    user_id: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        DELETE FROM conversation_states
        WHERE state_key = ?
        "#,
    )
    .bind(state_key(customer_id, channel, user_id))
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove expired rows.
pub async fn purge_expired(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM conversation_states
        WHERE expires_at <= ?
        "#,
    )
    .bind(now_timestamp())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn state(expense_id: &str, expires_at: &str) -> ConversationState {
        ConversationState {
            customer_id: "cust_1".to_string(),
            channel: "whatsapp".to_string(),
            user_id: "+51999".to_string(),
            expense_id: expense_id.to_string(),
            created_at: "2026-02-20T10:00:00.000Z".to_string(),
            expires_at: expires_at.to_string(),
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let db = Database::in_memory().await.unwrap();
        put_state(db.pool(), &state("exp_1", "2999-01-01T00:00:00.000Z"))
            .await
            .unwrap();

        let fetched = get_state(db.pool(), "cust_1", "whatsapp", "+51999")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.expense_id, "exp_1");

        // Other users and customers are isolated.
        assert!(get_state(db.pool(), "cust_2", "whatsapp", "+51999")
            .await
            .unwrap()
            .is_none());
        assert!(get_state(db.pool(), "cust_1", "telegram", "+51999")
            .await
            .unwrap()
            .is_none());

        delete_state(db.pool(), "cust_1", "whatsapp", "+51999").await.unwrap();
        assert!(get_state(db.pool(), "cust_1", "whatsapp", "+51999")
            .await
            .unwrap()
            .is_none());

        // Deleting again is fine.
        delete_state(db.pool(), "cust_1", "whatsapp", "+51999").await.unwrap();
    }

    #[tokio::test]
    async fn test_put_replaces_existing() {
        let db = Database::in_memory().await.unwrap();
        put_state(db.pool(), &state("exp_1", "2999-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        put_state(db.pool(), &state("exp_2", "2999-01-01T00:00:00.000Z"))
            .await
            .unwrap();

        let fetched = get_state(db.pool(), "cust_1", "whatsapp", "+51999")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.expense_id, "exp_2");
    }

    #[tokio::test]
    async fn test_expired_state_is_absent_and_purged() {
        let db = Database::in_memory().await.unwrap();
        put_state(db.pool(), &state("exp_1", "2020-01-01T00:00:00.000Z"))
            .await
            .unwrap();

        assert!(get_state(db.pool(), "cust_1", "whatsapp", "+51999")
            .await
            .unwrap()
            .is_none());
        assert_eq!(purge_expired(db.pool()).await.unwrap(), 1);
    }

    #[test]
    fn test_state_key() {
        assert_eq!(state_key("cust_1", "whatsapp", "+51999"), "conv:cust_1:whatsapp:+51999");
    }
}

//! Customers, their channel identities and inbound email routes.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::clock::now_timestamp;
use crate::error::{DatabaseError, Result};
use crate::models::{Customer, CustomerChannel};

impl Customer {
    /// A new active customer with regional defaults.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: "ACTIVE".to_string(),
            default_currency: "PEN".to_string(),
            timezone: "America/Lima".to_string(),
            locale: "es-PE".to_string(),
            confidence_threshold: None,
        }
    }
}

/// Create a new customer.
pub async fn create_customer(pool: &SqlitePool, customer: &Customer) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO customers (id, name, status, default_currency, timezone, locale, confidence_threshold)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&customer.id)
    .bind(&customer.name)
    .bind(&customer.status)
    .bind(&customer.default_currency)
    .bind(&customer.timezone)
    .bind(&customer.locale)
    .bind(customer.confidence_threshold)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::on_insert(e, "Customer", &customer.id))?;

    Ok(())
}

/// Get a customer by ID.
pub async fn get_customer(pool: &SqlitePool, id: &str) -> Result<Option<Customer>> {
    let record = sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, name, status, default_currency, timezone, locale, confidence_threshold
        FROM customers
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Find the customer owning a provider user id on a channel.
pub async fn find_by_channel_external_id(
    pool: &SqlitePool,
    channel: &str,
    external_user_id: &str,
) -> Result<Option<Customer>> {
    let record = sqlx::query_as::<_, Customer>(
        r#"
        SELECT c.id, c.name, c.status, c.default_currency, c.timezone, c.locale, c.confidence_threshold
        FROM customer_channels cc
        JOIN customers c ON c.id = cc.customer_id
        WHERE cc.channel = ? AND cc.external_user_id = ?
        LIMIT 1
        "#,
    )
    .bind(channel)
    .bind(external_user_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// The provider user id a customer is primarily reached at on a channel.
pub async fn get_primary_external_user_id(
    pool: &SqlitePool,
    customer_id: &str,
    channel: &str,
) -> Result<Option<String>> {
    let user_id = sqlx::query_scalar::<_, String>(
        r#"
        SELECT external_user_id
        FROM customer_channels
        WHERE customer_id = ? AND channel = ? AND is_primary = 1
        LIMIT 1
        "#,
    )
    .bind(customer_id)
    .bind(channel)
    .fetch_optional(pool)
    .await?;

    Ok(user_id)
}

/// Map a provider user id to a customer, replacing any previous mapping.
pub async fn create_channel_mapping(
    pool: &SqlitePool,
    customer_id: &str,
    channel: &str,
    external_user_id: &str,
    is_primary: bool,
) -> Result<CustomerChannel> {
    let now = now_timestamp();

    sqlx::query(
        r#"
        INSERT INTO customer_channels (id, customer_id, channel, external_user_id, is_primary, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(channel, external_user_id) DO UPDATE SET
            customer_id = excluded.customer_id,
            is_primary = excluded.is_primary,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(customer_id)
    .bind(channel)
    .bind(external_user_id)
    .bind(is_primary)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query_as::<_, CustomerChannel>(
        r#"
        SELECT id, customer_id, channel, external_user_id, is_primary
        FROM customer_channels
        WHERE channel = ? AND external_user_id = ?
        "#,
    )
    .bind(channel)
    .bind(external_user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "CustomerChannel",
        id: format!("{}:{}", channel, external_user_id),
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Route mail sent to `recipient_email` to a customer.
pub async fn upsert_email_route(
    pool: &SqlitePool,
    recipient_email: &str,
    customer_id: &str,
    enabled: bool,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO customer_email_routes (recipient_email, customer_id, enabled)
        VALUES (?, ?, ?)
        ON CONFLICT(recipient_email) DO UPDATE SET
            customer_id = excluded.customer_id,
            enabled = excluded.enabled
        "#,
    )
    .bind(normalize_email(recipient_email))
    .bind(customer_id)
    .bind(enabled)
    .execute(pool)
    .await?;

    Ok(())
}

/// Resolve the customer an inbound email belongs to. Disabled routes are ignored.
pub async fn resolve_customer_by_recipient_email(
    pool: &SqlitePool,
    recipient_email: &str,
) -> Result<Option<String>> {
    let customer_id = sqlx::query_scalar::<_, String>(
        r#"
        SELECT customer_id
        FROM customer_email_routes
        WHERE recipient_email = ? AND enabled = 1
        LIMIT 1
        "#,
    )
    .bind(normalize_email(recipient_email))
    .fetch_optional(pool)
    .await?;

    Ok(customer_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn test_customer_lookup_by_channel_identity() {
        let db = Database::in_memory().await.unwrap();
        create_customer(db.pool(), &Customer::new("cust_1", "Ana")).await.unwrap();
        create_channel_mapping(db.pool(), "cust_1", "whatsapp", "+51999", true)
            .await
            .unwrap();

        let found = find_by_channel_external_id(db.pool(), "whatsapp", "+51999")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "cust_1");
        assert!(found.confidence_threshold.is_none());

        assert!(find_by_channel_external_id(db.pool(), "telegram", "+51999")
            .await
            .unwrap()
            .is_none());

        let primary = get_primary_external_user_id(db.pool(), "cust_1", "whatsapp")
            .await
            .unwrap();
        assert_eq!(primary.as_deref(), Some("+51999"));
    }

    #[tokio::test]
    async fn test_duplicate_customer() {
        let db = Database::in_memory().await.unwrap();
        create_customer(db.pool(), &Customer::new("cust_1", "Ana")).await.unwrap();
        let result = create_customer(db.pool(), &Customer::new("cust_1", "Ana")).await;
        assert!(matches!(result, Err(DatabaseError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_mapping_is_replaced() {
        let db = Database::in_memory().await.unwrap();
        create_customer(db.pool(), &Customer::new("cust_1", "Ana")).await.unwrap();
        create_customer(db.pool(), &Customer::new("cust_2", "Luis")).await.unwrap();

        let first = create_channel_mapping(db.pool(), "cust_1", "telegram", "42", false)
            .await
            .unwrap();
        let second = create_channel_mapping(db.pool(), "cust_2", "telegram", "42", true)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.customer_id, "cust_2");
        assert!(second.is_primary);
    }

    #[tokio::test]
    async fn test_email_routes() {
        let db = Database::in_memory().await.unwrap();
        create_customer(db.pool(), &Customer::new("cust_1", "Ana")).await.unwrap();
        upsert_email_route(db.pool(), " Gastos@Example.com ", "cust_1", true)
            .await
            .unwrap();

        let resolved = resolve_customer_by_recipient_email(db.pool(), "gastos@example.COM")
            .await
            .unwrap();
        assert_eq!(resolved.as_deref(), Some("cust_1"));

        upsert_email_route(db.pool(), "gastos@example.com", "cust_1", false)
            .await
            .unwrap();
        assert!(resolve_customer_by_recipient_email(db.pool(), "gastos@example.com")
            .await
            .unwrap()
            .is_none());
    }
}

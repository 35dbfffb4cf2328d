//! Plans, subscriptions and plan feature entitlements.

use sqlx::SqlitePool;

use crate::models::{CustomerSubscription, Plan, PlanFeature};
use crate::Result;

/// Resolve the subscription that currently governs a customer's entitlements.
///
/// Only TRIALING, ACTIVE and PAST_DUE subscriptions count. ACTIVE wins, then
/// TRIALING (soonest-expiring first), then the rest by latest period end.
pub async fn get_effective_subscription(
    pool: &SqlitePool,
    customer_id: &str,
) -> Result<Option<CustomerSubscription>> {
    let record = sqlx::query_as::<_, CustomerSubscription>(
        r#"
        SELECT id, customer_id, plan_id, status, start_at, current_period_start,
               current_period_end, cancel_at_period_end, provider, provider_subscription_id
        FROM customer_subscriptions
        WHERE customer_id = ? AND status IN ('TRIALING', 'ACTIVE', 'PAST_DUE')
        ORDER BY CASE status WHEN 'ACTIVE' THEN 0 WHEN 'TRIALING' THEN 1 ELSE 2 END ASC,
                 CASE WHEN status = 'TRIALING' THEN current_period_end END ASC,
                 current_period_end DESC
        LIMIT 1
        "#,
    )
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Create a subscription.
pub async fn create_subscription(pool: &SqlitePool, subscription: &CustomerSubscription) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO customer_subscriptions (
            id, customer_id, plan_id, status, start_at, current_period_start,
            current_period_end, cancel_at_period_end, provider, provider_subscription_id
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&subscription.id)
    .bind(&subscription.customer_id)
    .bind(&subscription.plan_id)
    .bind(&subscription.status)
    .bind(&subscription.start_at)
    .bind(&subscription.current_period_start)
    .bind(&subscription.current_period_end)
    .bind(subscription.cancel_at_period_end)
    .bind(&subscription.provider)
    .bind(&subscription.provider_subscription_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a plan by ID.
pub async fn get_plan(pool: &SqlitePool, plan_id: &str) -> Result<Option<Plan>> {
    let record = sqlx::query_as::<_, Plan>(
        r#"
        SELECT id, name, price_amount, price_currency, billing_interval, status, version
        FROM plans
        WHERE id = ?
        "#,
    )
    .bind(plan_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Create or update a plan.
pub async fn upsert_plan(pool: &SqlitePool, plan: &Plan) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO plans (id, name, price_amount, price_currency, billing_interval, status, version)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            price_amount = excluded.price_amount,
            price_currency = excluded.price_currency,
            billing_interval = excluded.billing_interval,
            status = excluded.status,
            version = excluded.version
        "#,
    )
    .bind(&plan.id)
    .bind(&plan.name)
    .bind(plan.price_amount)
    .bind(&plan.price_currency)
    .bind(&plan.billing_interval)
    .bind(&plan.status)
    .bind(plan.version)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a plan's entitlement for a feature key.
pub async fn get_plan_feature(
    pool: &SqlitePool,
    plan_id: &str,
    feature_key: &str,
) -> Result<Option<PlanFeature>> {
    let record = sqlx::query_as::<_, PlanFeature>(
        r#"
        SELECT plan_id, feature_key, feature_type, bool_value, limit_value
        FROM plan_features
        WHERE plan_id = ? AND feature_key = ?
        "#,
    )
    .bind(plan_id)
    .bind(feature_key)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Create or update a plan's entitlement for a feature key.
pub async fn upsert_plan_feature(pool: &SqlitePool, feature: &PlanFeature) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO plan_features (plan_id, feature_key, feature_type, bool_value, limit_value)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(plan_id, feature_key) DO UPDATE SET
            feature_type = excluded.feature_type,
            bool_value = excluded.bool_value,
            limit_value = excluded.limit_value
        "#,
    )
    .bind(&feature.plan_id)
    .bind(&feature.feature_key)
    .bind(&feature.feature_type)
    .bind(feature.bool_value)
    .bind(feature.limit_value)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer;
    use crate::models::Customer;
    use crate::Database;

    fn subscription(id: &str, plan_id: &str, status: &str, period_end: &str) -> CustomerSubscription {
        CustomerSubscription {
            id: id.to_string(),
            customer_id: "cust_1".to_string(),
            plan_id: plan_id.to_string(),
            status: status.to_string(),
            start_at: "2026-01-01T00:00:00.000Z".to_string(),
            current_period_start: "2026-01-01T00:00:00.000Z".to_string(),
            current_period_end: period_end.to_string(),
            cancel_at_period_end: false,
            provider: "manual".to_string(),
            provider_subscription_id: None,
        }
    }

    async fn setup() -> Database {
        let db = Database::in_memory().await.unwrap();
        customer::create_customer(db.pool(), &Customer::new("cust_1", "Ana"))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_active_preferred_over_trialing() {
        let db = setup().await;
        create_subscription(db.pool(), &subscription("sub_trial", "free", "TRIALING", "2026-12-01T00:00:00.000Z"))
            .await
            .unwrap();
        create_subscription(db.pool(), &subscription("sub_active", "free", "ACTIVE", "2026-02-01T00:00:00.000Z"))
            .await
            .unwrap();

        let effective = get_effective_subscription(db.pool(), "cust_1").await.unwrap().unwrap();
        assert_eq!(effective.id, "sub_active");
    }

    #[tokio::test]
    async fn test_trialing_ties_break_by_soonest_end() {
        let db = setup().await;
        create_subscription(db.pool(), &subscription("sub_late", "free", "TRIALING", "2026-12-01T00:00:00.000Z"))
            .await
            .unwrap();
        create_subscription(db.pool(), &subscription("sub_soon", "free", "TRIALING", "2026-03-01T00:00:00.000Z"))
            .await
            .unwrap();
        create_subscription(db.pool(), &subscription("sub_due", "free", "PAST_DUE", "2027-01-01T00:00:00.000Z"))
            .await
            .unwrap();

        let effective = get_effective_subscription(db.pool(), "cust_1").await.unwrap().unwrap();
        assert_eq!(effective.id, "sub_soon");
    }

    #[tokio::test]
    async fn test_past_due_by_latest_end_and_ignores_canceled() {
        let db = setup().await;
        create_subscription(db.pool(), &subscription("sub_old", "free", "PAST_DUE", "2026-01-15T00:00:00.000Z"))
            .await
            .unwrap();
        create_subscription(db.pool(), &subscription("sub_new", "free", "PAST_DUE", "2026-04-15T00:00:00.000Z"))
            .await
            .unwrap();
        create_subscription(db.pool(), &subscription("sub_gone", "free", "CANCELED", "2027-01-01T00:00:00.000Z"))
            .await
            .unwrap();

        let effective = get_effective_subscription(db.pool(), "cust_1").await.unwrap().unwrap();
        assert_eq!(effective.id, "sub_new");
    }

    #[tokio::test]
    async fn test_no_subscription() {
        let db = setup().await;
        assert!(get_effective_subscription(db.pool(), "cust_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_plan_feature_upsert() {
        let db = setup().await;
        upsert_plan_feature(
            db.pool(),
            &PlanFeature {
                plan_id: "free".to_string(),
                feature_key: "channels.whatsapp".to_string(),
                feature_type: "limit".to_string(),
                bool_value: None,
                limit_value: Some(0),
            },
        )
        .await
        .unwrap();

        let feature = get_plan_feature(db.pool(), "free", "channels.whatsapp")
            .await
            .unwrap()
            .unwrap();
        assert!(!feature.is_enabled());
        assert!(get_plan_feature(db.pool(), "free", "channels.sms").await.unwrap().is_none());
    }
}

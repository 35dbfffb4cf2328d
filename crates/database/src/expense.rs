//! Expense persistence and its audit trail.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::clock::now_timestamp;
use crate::error::Result;
use crate::models::{Expense, ExpenseEvent, ExpenseStatus, NewExpense};

/// Event type recorded when an expense gets its category.
pub const EXPENSE_CATEGORIZED: &str = "EXPENSE_CATEGORIZED";

/// Persist a new expense awaiting a category.
pub async fn create_pending(pool: &SqlitePool, input: &NewExpense) -> Result<Expense> {
    let now = now_timestamp();
    let expense = Expense {
        id: Uuid::new_v4().to_string(),
        customer_id: input.customer_id.clone(),
        amount: input.amount,
        currency: input.currency.clone(),
        merchant: input.merchant.clone(),
        occurred_at: input.occurred_at.clone(),
        bank: input.bank.clone(),
        raw_text: input.raw_text.clone(),
        status: ExpenseStatus::PendingCategory,
        category_id: None,
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO expenses (
            id, customer_id, amount, currency, merchant, occurred_at, bank, raw_text,
            status, category_id, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
        "#,
    )
    .bind(&expense.id)
    .bind(&expense.customer_id)
    .bind(expense.amount)
    .bind(&expense.currency)
    .bind(&expense.merchant)
    .bind(&expense.occurred_at)
    .bind(&expense.bank)
    .bind(&expense.raw_text)
    .bind(expense.status)
    .bind(&expense.created_at)
    .bind(&expense.updated_at)
    .execute(pool)
    .await?;

    Ok(expense)
}

/// Get an expense by ID, scoped to its customer.
pub async fn get_by_id(pool: &SqlitePool, id: &str, customer_id: &str) -> Result<Option<Expense>> {
    let record = sqlx::query_as::<_, Expense>(
        r#"
        SELECT id, customer_id, amount, currency, merchant, occurred_at, bank, raw_text,
               status, category_id, created_at, updated_at
        FROM expenses
        WHERE id = ? AND customer_id = ?
        "#,
    )
    .bind(id)
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Move a pending expense to CATEGORIZED and record an audit event.
///
/// Returns `false` without writing anything when the expense is missing or no
/// longer pending.
pub async fn mark_categorized(
    pool: &SqlitePool,
    id: &str,
    customer_id: &str,
    category_id: &str,
) -> Result<bool> {
    let now = now_timestamp();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE expenses
        SET status = 'CATEGORIZED', category_id = ?, updated_at = ?
        WHERE id = ? AND customer_id = ? AND status = 'PENDING_CATEGORY'
        "#,
    )
    .bind(category_id)
    .bind(&now)
    .bind(id)
    .bind(customer_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    let payload = serde_json::json!({ "categoryId": category_id }).to_string();

    sqlx::query(
        r#"
        INSERT INTO expense_events (id, customer_id, expense_id, type, payload_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(customer_id)
    .bind(id)
    .bind(EXPENSE_CATEGORIZED)
    .bind(payload)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// List audit events for an expense, oldest first.
pub async fn list_events(pool: &SqlitePool, expense_id: &str) -> Result<Vec<ExpenseEvent>> {
    let events = sqlx::query_as::<_, ExpenseEvent>(
        r#"
        SELECT id, customer_id, expense_id, type, payload_json, created_at
        FROM expense_events
        WHERE expense_id = ?
        ORDER BY created_at, id
        "#,
    )
    .bind(expense_id)
    .fetch_all(pool)
    .await?;

    Ok(events)
}

/// Count a customer's expenses.
pub async fn count_for_customer(pool: &SqlitePool, customer_id: &str) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM expenses WHERE customer_id = ?
        "#,
    )
    .bind(customer_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

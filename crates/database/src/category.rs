//! Category lookups, scoped to a customer.
//!
//! A customer sees the global categories plus its own. When neither exist the
//! built-in defaults stand in.

use expense_core::{default_categories, Category};
use sqlx::SqlitePool;

use crate::models::CategoryRecord;
use crate::Result;

/// List the categories available to a customer, ordered by name.
pub async fn list_for_customer(pool: &SqlitePool, customer_id: &str) -> Result<Vec<Category>> {
    let records = sqlx::query_as::<_, CategoryRecord>(
        r#"
        SELECT id, customer_id, name, slug
        FROM categories
        WHERE customer_id IS NULL OR customer_id = ?
        ORDER BY name ASC
        "#,
    )
    .bind(customer_id)
    .fetch_all(pool)
    .await?;

    if records.is_empty() {
        return Ok(default_categories());
    }

    Ok(records.into_iter().map(Category::from).collect())
}

/// Get a category visible to a customer by ID.
pub async fn get_by_id(pool: &SqlitePool, customer_id: &str, id: &str) -> Result<Option<Category>> {
    let record = sqlx::query_as::<_, CategoryRecord>(
        r#"
        SELECT id, customer_id, name, slug
        FROM categories
        WHERE id = ? AND (customer_id IS NULL OR customer_id = ?)
        "#,
    )
    .bind(id)
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;

    if let Some(record) = record {
        return Ok(Some(record.into()));
    }

    Ok(default_categories().into_iter().find(|c| c.id == id))
}

/// Create a category. `customer_id = None` makes it global.
pub async fn create_category(pool: &SqlitePool, record: &CategoryRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO categories (id, customer_id, name, slug)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.customer_id)
    .bind(&record.name)
    .bind(&record.slug)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a category by ID.
pub async fn delete_category(pool: &SqlitePool, id: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM categories
        WHERE id = ?
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer;
    use crate::models::Customer;
    use crate::Database;

    fn record(id: &str, customer_id: Option<&str>, name: &str) -> CategoryRecord {
        CategoryRecord {
            id: id.to_string(),
            customer_id: customer_id.map(str::to_string),
            name: name.to_string(),
            slug: name.to_lowercase(),
        }
    }

    #[tokio::test]
    async fn test_defaults_when_empty() {
        let db = Database::in_memory().await.unwrap();
        let categories = list_for_customer(db.pool(), "cust_1").await.unwrap();
        assert_eq!(categories, default_categories());

        let food = get_by_id(db.pool(), "cust_1", "cat_food").await.unwrap().unwrap();
        assert_eq!(food.name, "Comida");
        assert!(get_by_id(db.pool(), "cust_1", "cat_nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_customer_scoping() {
        let db = Database::in_memory().await.unwrap();
        for id in ["cust_1", "cust_2"] {
            customer::create_customer(db.pool(), &Customer::new(id, id)).await.unwrap();
        }
        create_category(db.pool(), &record("cat_global", None, "Salud")).await.unwrap();
        create_category(db.pool(), &record("cat_pets", Some("cust_1"), "Mascotas"))
            .await
            .unwrap();
        create_category(db.pool(), &record("cat_gym", Some("cust_2"), "Gimnasio"))
            .await
            .unwrap();

        let names: Vec<String> = list_for_customer(db.pool(), "cust_1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Mascotas", "Salud"]);

        assert!(get_by_id(db.pool(), "cust_1", "cat_gym").await.unwrap().is_none());
        assert!(get_by_id(db.pool(), "cust_2", "cat_gym").await.unwrap().is_some());

        assert_eq!(delete_category(db.pool(), "cat_pets").await.unwrap(), 1);
        assert!(get_by_id(db.pool(), "cust_1", "cat_pets").await.unwrap().is_none());
    }
}

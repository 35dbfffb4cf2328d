//! SQLite persistence layer for gastos.
//!
//! This crate provides async database operations for the webhook idempotency
//! ledger, conversation state, expenses, categories, channel policy,
//! subscriptions and receipt media, using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use database::{webhook_event, Database, IdempotencyStatus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:gastos.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // Claim a webhook delivery
//!     let status = webhook_event::try_start_processing(
//!         db.pool(),
//!         "kapso_whatsapp",
//!         "evt_1",
//!         "payload-sha256",
//!         None,
//!     )
//!     .await?;
//!     assert_eq!(status, IdempotencyStatus::New);
//!
//!     Ok(())
//! }
//! ```

pub mod category;
pub mod channel_policy;
pub mod chat_media;
pub mod clock;
pub mod conversation_state;
pub mod customer;
pub mod error;
pub mod expense;
pub mod models;
pub mod object_store;
pub mod subscription;
pub mod webhook_event;

pub use error::{DatabaseError, Result};
pub use models::{
    Channel, ChatMedia, ConversationState, Customer, CustomerChannel, CustomerChannelSetting,
    CustomerSubscription, Expense, ExpenseEvent, ExpenseStatus, IdempotencyStatus, NewChatMedia,
    NewExpense, Plan, PlanFeature, WebhookEvent, WebhookEventStatus,
};
pub use object_store::LocalObjectStore;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 10;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/gastos.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(pool_size, "database.connected");

        Ok(Self { pool })
    }

    /// Open a migrated in-memory database on a single connection.
    ///
    /// Used by tests across the workspace.
    pub async fn in_memory() -> Result<Self> {
        let db = Self::connect_with_pool_size("sqlite::memory:", 1).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Apply the embedded migrations. Safe to call on an up-to-date schema.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database.migrated");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_seed_defaults() {
        let db = Database::in_memory().await.unwrap();

        let whatsapp = channel_policy::get_channel(db.pool(), "whatsapp").await.unwrap();
        assert_eq!(whatsapp.map(|c| c.status), Some("ACTIVE".to_string()));

        let free = subscription::get_plan(db.pool(), "free").await.unwrap();
        assert!(free.is_some());

        let feature = subscription::get_plan_feature(db.pool(), "free", "channels.whatsapp")
            .await
            .unwrap()
            .unwrap();
        assert!(feature.is_enabled());
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        db.migrate().await.unwrap();
    }
}

//! Persistence errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A row the caller expected to exist is missing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An insert hit a unique key.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },
}

impl DatabaseError {
    /// Map an insert failure, turning a unique-key violation into
    /// [`DatabaseError::AlreadyExists`].
    pub fn on_insert(err: sqlx::Error, entity: &'static str, id: &str) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => DatabaseError::AlreadyExists {
                entity,
                id: id.to_string(),
            },
            other => DatabaseError::Sqlx(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

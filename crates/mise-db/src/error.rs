//! # Storage Errors
//!
//! [`DbError`] is what every repository and engine returns. It wraps rule
//! violations from mise-core as-is and classifies raw SQLite failures.
//!
//! Lock conflicts surface as [`DbError::Busy`]. Every repository write runs
//! under the pool's [`RetryPolicy`](crate::RetryPolicy), so Busy stays
//! inside the retry loop; once its budget is spent the caller gets
//! [`DbError::ConcurrencyConflict`]. Reads never take the write lock under
//! WAL. [`DbError::kind`] collapses all of it
//! into the [`ErrorKind`] a transport would map to a response.

use mise_core::{CoreError, ErrorKind, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A rule from mise-core refused the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{field} '{value}' is already taken")]
    UniqueViolation { field: String, value: String },

    /// A table, menu item, ingredient or event id that does not exist.
    #[error("Dangling reference: {message}")]
    ForeignKeyViolation { message: String },

    /// Another writer holds the lock.
    #[error("Database is busy: {0}")]
    Busy(String),

    #[error("{operation} gave up after {attempts} attempts due to concurrent writers")]
    ConcurrencyConflict { operation: String, attempts: u32 },

    #[error("Cannot open database: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Statement failed: {0}")]
    QueryFailed(String),

    /// No pooled connection freed up within the acquire timeout.
    #[error("Timed out waiting for a database connection")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Classifies the error for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::Core(err) => err.kind(),
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                ErrorKind::Validation
            }
            DbError::Busy(_) | DbError::ConcurrencyConflict { .. } => {
                ErrorKind::ConcurrencyConflict
            }
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => ErrorKind::Storage,
        }
    }

    /// True for lock conflicts that the retry loop should absorb.
    pub fn is_busy(&self) -> bool {
        matches!(self, DbError::Busy(_))
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(CoreError::Validation(err))
    }
}

/// SQLITE_BUSY, SQLITE_LOCKED and their extended codes.
const BUSY_CODES: &[&str] = &["5", "6", "261", "262", "517"];

fn classify(err: &dyn sqlx::error::DatabaseError) -> DbError {
    let message = err.message();
    let busy_code = err.code().is_some_and(|code| BUSY_CODES.contains(&&*code));

    if busy_code || message.contains("is locked") {
        return DbError::Busy(message.to_string());
    }
    if let Some(columns) = message.strip_prefix("UNIQUE constraint failed: ") {
        return DbError::UniqueViolation {
            field: columns.to_string(),
            value: "?".to_string(),
        };
    }
    if message.contains("FOREIGN KEY constraint failed") {
        return DbError::ForeignKeyViolation {
            message: message.to_string(),
        };
    }
    DbError::QueryFailed(message.to_string())
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "?"),
            sqlx::Error::Database(db_err) => classify(&*db_err),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

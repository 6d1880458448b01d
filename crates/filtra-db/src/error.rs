//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (filtra-pricing seam) ← Unavailable vs Internal            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PricingError::StoreUnavailable ← What the caller sees                 │
//! │                                                                         │
//! │  Driver messages never travel past this crate's boundary.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and caller decisions.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation (duplicate rule code, duplicate
    /// snapshot, any UNIQUE index violation).
    #[error("Duplicate {field}: already exists")]
    UniqueViolation { field: String },

    /// An optimistic-concurrency update lost its race: the row's version
    /// (or conditioned status/balance) changed underneath us.
    #[error("concurrent modification of {entity}: {id}")]
    ConcurrentModification { entity: String, id: String },

    /// A row failed domain validation on the way in or out.
    #[error("invalid {entity}: {reason}")]
    InvalidEntity { entity: String, reason: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a ConcurrentModification error.
    pub fn concurrent(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::ConcurrentModification {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidEntity error.
    pub fn invalid(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        DbError::InvalidEntity {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE: "UNIQUE constraint failed: <table>.<column>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation { field }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Maps a database error onto the pricing seam's two-way split:
/// connectivity problems are retriable `Unavailable`, the rest is
/// `Internal`.
pub fn to_store_error(err: DbError) -> filtra_pricing::StoreError {
    match err {
        DbError::PoolExhausted | DbError::ConnectionFailed(_) => {
            filtra_pricing::StoreError::Unavailable(err.to_string())
        }
        other => filtra_pricing::StoreError::Internal(other.to_string()),
    }
}

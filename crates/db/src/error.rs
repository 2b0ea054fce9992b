//! Storage errors

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Another writer already took this ledger position
    #[error("ledger position {seq} already taken for user {user_id}")]
    Conflict { user_id: Uuid, seq: i64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A stored row could not be mapped back to a domain type
    #[error("corrupt row: {0}")]
    Decode(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => common::Error::Conflict(err.to_string()),
            StoreError::NotFound(msg) => common::Error::NotFound(msg),
            StoreError::Duplicate(msg) => common::Error::Conflict(msg),
            StoreError::Decode(msg) => common::Error::Internal(msg),
            StoreError::Database(e) => common::Error::Database(e.to_string()),
        }
    }
}

/// Map unique and foreign-key violations onto domain errors
pub(crate) fn classify(
    err: sqlx::Error,
    on_unique: impl FnOnce() -> StoreError,
    on_fk: impl FnOnce() -> StoreError,
) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return on_unique();
        }
        if db_err.is_foreign_key_violation() {
            return on_fk();
        }
    }
    StoreError::Database(err)
}

pub(crate) fn decode<T, E: std::fmt::Display>(value: Result<T, E>) -> Result<T, StoreError> {
    value.map_err(|e| StoreError::Decode(e.to_string()))
}

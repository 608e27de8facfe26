use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by repository implementations. Backends map their
/// native failures (e.g. sqlx unique violations) onto these variants so
/// callers can react without knowing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// A unique constraint rejected the write. `constraint` names the
    /// logical key (e.g. "request_id", "sku", "email").
    #[error("duplicate value for unique {constraint}")]
    Duplicate { constraint: &'static str },

    #[error("insufficient stock for item {item_id}: available {available}, requested {requested}")]
    InsufficientStock {
        item_id: Uuid,
        available: i32,
        requested: i32,
    },

    /// The row is referenced by other rows and cannot be deleted.
    #[error("record {0} is still referenced")]
    Referenced(String),

    /// The row exists but its current state does not allow the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

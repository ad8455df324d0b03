//! Event store and projection errors

use shared::ParseEnumError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    /// Sequence allocation kept colliding; cannot happen while the
    /// per-order lock is honoured by every writer
    #[error("Sequence contention on order {order_id} after {attempts} attempts")]
    SequenceContention { order_id: i64, attempts: u32 },

    #[error("Corrupt row: {0}")]
    Corrupt(#[from] ParseEnumError),
}

pub type StoreResult<T> = Result<T, StoreError>;

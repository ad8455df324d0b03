//! Payment ingestion errors

use shared::ParseEnumError;
use thiserror::Error;

use crate::orders::StoreError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt ledger row: {0}")]
    Corrupt(#[from] ParseEnumError),

    /// Insert conflicted but the conflicting row could not be read back
    #[error("Ledger row for {provider}:{provider_event_id} vanished")]
    Vanished {
        provider: String,
        provider_event_id: String,
    },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Raised after the ledger row committed (order effects phase)
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IngestError {
    /// The ledger row is durable; only the order effects need another run
    pub fn ledger_committed(&self) -> bool {
        matches!(self, IngestError::Store(_))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
pub type IngestResult<T> = Result<T, IngestError>;

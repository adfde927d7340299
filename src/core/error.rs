//! Errors returned by the storage traits.

use thiserror::Error;

/// Failure of a ledger, adjustment registry or price cache operation.
///
/// `Conflict` is the only variant callers are expected to branch on; every
/// other variant is an opaque storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reward already recorded for user {user_id} and symbol {symbol}")]
    Conflict { user_id: String, symbol: String },

    #[error("storage backend failure: {0}")]
    Backend(#[from] fjall::Error),

    #[error("failed to encode or decode a stored record: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("storage failure: {0}")]
    Other(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

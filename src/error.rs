use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::AccountType;

/// Failures of the balance store (sqlite kv table or in-memory double)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("snapshot (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported snapshot schema version {0}")]
    UnsupportedVersion(u32),
}

/// Errors returned by balance mutations
#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("insufficient {account} balance: available {available}, requested {requested}")]
    InsufficientBalance {
        account: AccountType,
        available: Decimal,
        requested: Decimal,
    },

    #[error("amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),

    #[error("amount {0} is out of range for the {1} ledger")]
    AmountOutOfRange(Decimal, AccountType),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

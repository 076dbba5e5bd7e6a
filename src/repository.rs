//! Storage seam for the balances document.
//!
//! The manager only sees [`BalanceStore`]; the sqlite implementation keeps the
//! whole [`AccountBalances`] as a single JSON value under
//! [`BALANCES_KEY`], and the in-memory one backs tests and ephemeral runs.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::database::{kv_get, kv_put, DbPool};
use crate::error::StorageError;
use crate::types::{AccountBalances, SNAPSHOT_VERSION};

pub const BALANCES_KEY: &str = "dashboard_account_balances";

#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Load the stored snapshot, `None` when nothing was saved yet
    async fn load_account_balances(&self) -> Result<Option<AccountBalances>, StorageError>;

    /// Replace the stored snapshot
    async fn save_account_balances(&self, snapshot: &AccountBalances) -> Result<(), StorageError>;
}

/// Decode a stored document, accepting the legacy unversioned shape
pub fn decode_snapshot(raw: &str) -> Result<AccountBalances, StorageError> {
    let snapshot: AccountBalances = serde_json::from_str(raw)?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(StorageError::UnsupportedVersion(snapshot.version));
    }
    Ok(snapshot)
}

pub fn encode_snapshot(snapshot: &AccountBalances) -> Result<String, StorageError> {
    let mut snapshot = snapshot.clone();
    snapshot.version = SNAPSHOT_VERSION;
    Ok(serde_json::to_string(&snapshot)?)
}

pub struct SqliteBalanceStore {
    db: DbPool,
}

impl SqliteBalanceStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BalanceStore for SqliteBalanceStore {
    async fn load_account_balances(&self) -> Result<Option<AccountBalances>, StorageError> {
        match kv_get(&self.db, BALANCES_KEY).await? {
            Some(raw) => decode_snapshot(&raw).map(Some),
            None => Ok(None),
        }
    }

    async fn save_account_balances(&self, snapshot: &AccountBalances) -> Result<(), StorageError> {
        let raw = encode_snapshot(snapshot)?;
        kv_put(&self.db, BALANCES_KEY, &raw).await?;
        tracing::debug!(bytes = raw.len(), "saved account balances");
        Ok(())
    }
}

/// Keeps the encoded document in memory, so it still exercises the JSON path
#[derive(Default)]
pub struct MemoryBalanceStore {
    raw: Mutex<Option<String>>,
    writes: Mutex<usize>,
}

impl MemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a raw document, as if written by an older build
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
            writes: Mutex::new(0),
        }
    }

    /// Number of successful saves
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BalanceStore for MemoryBalanceStore {
    async fn load_account_balances(&self) -> Result<Option<AccountBalances>, StorageError> {
        let raw = self.raw.lock().unwrap_or_else(|e| e.into_inner()).clone();
        raw.as_deref().map(decode_snapshot).transpose()
    }

    async fn save_account_balances(&self, snapshot: &AccountBalances) -> Result<(), StorageError> {
        let raw = encode_snapshot(snapshot)?;
        *self.raw.lock().unwrap_or_else(|e| e.into_inner()) = Some(raw);
        *self.writes.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

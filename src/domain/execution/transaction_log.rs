//! Append-only record of every attempted on-chain action

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::Mutex;

use crate::shared::errors::LogError;
use crate::shared::utils::generate_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Allocate,
    Rebalance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Success,
    Failed,
}

/// One attempted action. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionLogEntry {
    pub id: String,
    #[serde(with = "crate::shared::utils::pubkey_string")]
    pub user: Pubkey,
    pub pool: String,
    #[serde(with = "crate::shared::utils::pubkey_string")]
    pub strategy: Pubkey,
    pub action: ActionType,
    #[serde(with = "crate::shared::utils::pubkey_string")]
    pub token: Pubkey,
    #[serde(with = "crate::shared::utils::biguint_string")]
    pub amount: BigUint,
    pub tx_hash: Option<String>,
    pub status: TxStatus,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TransactionLogEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user: Pubkey,
        pool: &str,
        strategy: Pubkey,
        action: ActionType,
        token: Pubkey,
        amount: BigUint,
        tx_hash: Option<String>,
        status: TxStatus,
        error: Option<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            user,
            pool: pool.to_string(),
            strategy,
            action,
            token,
            amount,
            tx_hash,
            status,
            error,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only sink for attempted actions
#[async_trait]
pub trait TransactionLog: Send + Sync {
    async fn append(&self, entry: TransactionLogEntry) -> Result<(), LogError>;
}

/// In-memory log, used for dry runs and tests
#[derive(Default)]
pub struct MemoryTransactionLog {
    entries: Mutex<Vec<TransactionLogEntry>>,
}

impl MemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<TransactionLogEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl TransactionLog for MemoryTransactionLog {
    async fn append(&self, entry: TransactionLogEntry) -> Result<(), LogError> {
        self.entries.lock().await.push(entry);
        Ok(())
    }
}

//! Pool domain - registered strategies and their validated snapshots

mod pool_registry;
mod state_aggregator;

pub use pool_registry::{PoolRegistry, StaticPoolRegistry};
pub use state_aggregator::{liquidity_room, AggregationReport, StateAggregator};

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::shared::types::{PairKey, TokenInfo};

/// Operational status of a registered pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    #[default]
    Active,
    Paused,
}

/// Candidate pool as registered by operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    #[serde(with = "crate::shared::utils::pubkey_string")]
    pub strategy: Pubkey,
    pub chain_id: String,
    pub base_token: TokenInfo,
    pub quote_token: TokenInfo,
    /// Smallest amount (base units) worth routing through the swap path
    #[serde(default)]
    pub min_swap_amount: u64,
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u32,
    /// Set when deposits in a token other than the underlying are swapped on entry
    #[serde(default)]
    pub swap_path: Option<String>,
    #[serde(default)]
    pub status: PoolStatus,
}

fn default_slippage_bps() -> u32 {
    100
}

impl PoolConfig {
    pub fn pair(&self) -> PairKey {
        PairKey::new(self.base_token.mint, self.quote_token.mint)
    }

    pub fn is_active(&self) -> bool {
        self.status == PoolStatus::Active
    }
}

/// Validated on-chain view of one pool, built fresh per evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub pool: PoolConfig,
    pub tvl: BigUint,
    pub total_assets: BigUint,
    pub user_share_balance: BigUint,
    pub liquidity_room: BigUint,
    pub base_decimals: u8,
    pub quote_decimals: u8,
}

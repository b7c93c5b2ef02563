//! Common types used across the keeper

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// Token representation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenInfo {
    #[serde(with = "crate::shared::utils::pubkey_string")]
    pub mint: Pubkey,
    pub symbol: String,
    pub decimals: u8,
}

/// Identity of a base/quote token pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub base: Pubkey,
    pub quote: Pubkey,
}

impl PairKey {
    pub fn new(base: Pubkey, quote: Pubkey) -> Self {
        Self { base, quote }
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}

/// Single-asset deposit event emitted by the vault program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
    pub token: Pubkey,
    pub receiver: Pubkey,
    pub amount: u64,
    pub actual_amount: u64,
    pub timestamp: i64,
}

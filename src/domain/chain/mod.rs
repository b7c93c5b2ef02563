//! Chain domain - read and write ports onto the vault protocol

use async_trait::async_trait;
use num_bigint::BigUint;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::shared::errors::{ChainError, OperationError};

/// Strategy state as recorded by the protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyState {
    pub is_active: bool,
    pub underlying_mint: Pubkey,
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub tvl: BigUint,
    pub total_assets: BigUint,
    pub total_shares: BigUint,
}

/// Per-token vault state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultState {
    pub paused: bool,
    pub total_assets: BigUint,
    pub undistributed: BigUint,
}

/// Per-token protocol caps. A zero `max_deposit_value` means uncapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCaps {
    pub max_percent_liquidity_bps: u32,
    pub max_deposit_value: BigUint,
}

/// Pool reserves and pair metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReserves {
    pub base_mint: Pubkey,
    pub quote_mint: Pubkey,
    pub base_reserve: BigUint,
    pub quote_reserve: BigUint,
    pub base_decimals: u8,
    pub quote_decimals: u8,
}

/// Read-only access to the protocol's state
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Fetch and decode the strategy account; doubles as the liveness check
    async fn strategy_state(&self, strategy: &Pubkey) -> Result<StrategyState, ChainError>;

    /// Shares held by `user` in `strategy` (zero when no position exists)
    async fn user_shares(&self, strategy: &Pubkey, user: &Pubkey) -> Result<BigUint, ChainError>;

    /// Convert a share amount to underlying assets
    async fn convert_to_assets(&self, strategy: &Pubkey, shares: &BigUint) -> Result<BigUint, ChainError>;

    async fn vault_state(&self, token: &Pubkey) -> Result<VaultState, ChainError>;

    async fn token_caps(&self, token: &Pubkey) -> Result<TokenCaps, ChainError>;

    async fn router_paused(&self) -> Result<bool, ChainError>;

    async fn pool_reserves(&self, strategy: &Pubkey) -> Result<PoolReserves, ChainError>;

    /// Expected output of swapping `amount_in` of `token_in` through the strategy's pool
    async fn quote_amount_out(
        &self,
        strategy: &Pubkey,
        token_in: &Pubkey,
        amount_in: &BigUint,
    ) -> Result<BigUint, ChainError>;

    /// Users holding a nonzero position for `token` in any strategy
    async fn position_holders(&self, token: &Pubkey) -> Result<Vec<Pubkey>, ChainError>;
}

/// Swap parameters for deposits entering through a swap path
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SwapParams {
    pub enabled: bool,
    pub min_amount_out: u64,
}

/// `allocate_deposit` call parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocateCall {
    pub strategy: Pubkey,
    pub token: Pubkey,
    pub depositor: Pubkey,
    pub amount: u64,
    pub fee: u64,
    pub swap: SwapParams,
    pub compute_units: u32,
}

/// `rebalance_position` call parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalanceCall {
    pub strategy: Pubkey,
    pub token: Pubkey,
    pub user: Pubkey,
    pub fee: u64,
    pub referral: bool,
    pub compute_units: u32,
}

/// Terminal status of a confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub signature: Signature,
    pub success: bool,
    pub error: Option<String>,
}

/// Write access through the keeper's signing identity
#[async_trait]
pub trait ProtocolWriter: Send + Sync {
    async fn send_allocate(&self, call: &AllocateCall) -> Result<Signature, ChainError>;

    async fn send_rebalance(&self, call: &RebalanceCall) -> Result<Signature, ChainError>;

    /// Block until the transaction has a terminal status
    async fn await_receipt(&self, signature: &Signature) -> Result<TxReceipt, ChainError>;
}

/// `GlobalPause` when the router or the token's vault is paused. A failed
/// read counts as paused: no action is taken on unknown pause state.
pub async fn ensure_not_paused(reader: &dyn ChainReader, token: &Pubkey) -> Result<(), OperationError> {
    let (router_paused, vault) = tokio::try_join!(reader.router_paused(), reader.vault_state(token))
        .map_err(|e| OperationError::GlobalPause(format!("pause state unreadable: {}", e)))?;
    if router_paused {
        return Err(OperationError::GlobalPause("router is paused".to_string()));
    }
    if vault.paused {
        return Err(OperationError::GlobalPause(format!("vault for {} is paused", token)));
    }
    Ok(())
}

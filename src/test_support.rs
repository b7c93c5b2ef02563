//! In-memory fakes of the chain ports for unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::Zero;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::domain::chain::{
    AllocateCall, ChainReader, PoolReserves, ProtocolWriter, RebalanceCall, StrategyState, TokenCaps, TxReceipt,
    VaultState,
};
use crate::domain::pool::{PoolConfig, PoolSnapshot, PoolStatus};
use crate::shared::errors::ChainError;
use crate::shared::types::TokenInfo;

pub fn usdc() -> Pubkey {
    Pubkey::new_from_array([1; 32])
}

pub fn sol() -> Pubkey {
    Pubkey::new_from_array([2; 32])
}

pub fn pool_config(name: &str) -> PoolConfig {
    PoolConfig {
        name: name.to_string(),
        strategy: Pubkey::new_unique(),
        chain_id: "mainnet-beta".to_string(),
        base_token: TokenInfo {
            mint: usdc(),
            symbol: "USDC".to_string(),
            decimals: 6,
        },
        quote_token: TokenInfo {
            mint: sol(),
            symbol: "SOL".to_string(),
            decimals: 9,
        },
        min_swap_amount: 0,
        slippage_bps: 100,
        swap_path: None,
        status: PoolStatus::Active,
    }
}

pub fn snapshot(name: &str, tvl: u64, liquidity_room: u64) -> PoolSnapshot {
    PoolSnapshot {
        pool: pool_config(name),
        tvl: BigUint::from(tvl),
        total_assets: BigUint::from(tvl),
        user_share_balance: BigUint::zero(),
        liquidity_room: BigUint::from(liquidity_room),
        base_decimals: 6,
        quote_decimals: 9,
    }
}

struct ChainState {
    strategies: HashMap<Pubkey, StrategyState>,
    positions: Vec<(Pubkey, Pubkey, BigUint)>,
    vault: VaultState,
    vault_error: Option<ChainError>,
    caps: TokenCaps,
    router_paused: bool,
    reserves: HashMap<Pubkey, PoolReserves>,
    quotes: HashMap<Pubkey, u64>,
}

/// Chain reader backed by maps. The vault holds 100_000 with a 50% cap
/// and 1_000_000 undistributed unless a test changes it.
pub struct FakeChain {
    state: Mutex<ChainState>,
    reads: AtomicUsize,
    strategy_reads: AtomicUsize,
    reserve_reads_in_flight: AtomicUsize,
    max_reserve_reads_in_flight: AtomicUsize,
}

impl FakeChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                strategies: HashMap::new(),
                positions: Vec::new(),
                vault: VaultState {
                    paused: false,
                    total_assets: BigUint::from(100_000u64),
                    undistributed: BigUint::from(1_000_000u64),
                },
                vault_error: None,
                caps: TokenCaps {
                    max_percent_liquidity_bps: 5_000,
                    max_deposit_value: BigUint::zero(),
                },
                router_paused: false,
                reserves: HashMap::new(),
                quotes: HashMap::new(),
            }),
            reads: AtomicUsize::new(0),
            strategy_reads: AtomicUsize::new(0),
            reserve_reads_in_flight: AtomicUsize::new(0),
            max_reserve_reads_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn add_strategy(&self, pool: &PoolConfig, tvl: u64, total_assets: u64) {
        let state = StrategyState {
            is_active: true,
            underlying_mint: pool.base_token.mint,
            base_mint: pool.base_token.mint,
            quote_mint: pool.quote_token.mint,
            tvl: BigUint::from(tvl),
            total_assets: BigUint::from(total_assets),
            total_shares: BigUint::from(total_assets),
        };
        self.state.lock().unwrap().strategies.insert(pool.strategy, state);
    }

    pub fn update_strategy(&self, strategy: &Pubkey, f: impl FnOnce(&mut StrategyState)) {
        let mut state = self.state.lock().unwrap();
        if let Some(s) = state.strategies.get_mut(strategy) {
            f(s);
        }
    }

    pub fn set_shares(&self, strategy: &Pubkey, user: &Pubkey, shares: u64) {
        let mut state = self.state.lock().unwrap();
        state.positions.retain(|(s, u, _)| !(s == strategy && u == user));
        state.positions.push((*strategy, *user, BigUint::from(shares)));
    }

    pub fn set_reserves(&self, pool: &PoolConfig, base_reserve: u64, quote_reserve: u64) {
        let reserves = PoolReserves {
            base_mint: pool.base_token.mint,
            quote_mint: pool.quote_token.mint,
            base_reserve: BigUint::from(base_reserve),
            quote_reserve: BigUint::from(quote_reserve),
            base_decimals: pool.base_token.decimals,
            quote_decimals: pool.quote_token.decimals,
        };
        self.state.lock().unwrap().reserves.insert(pool.strategy, reserves);
    }

    pub fn set_quote(&self, strategy: &Pubkey, amount_out: u64) {
        self.state.lock().unwrap().quotes.insert(*strategy, amount_out);
    }

    pub fn set_max_deposit_value(&self, value: u64) {
        self.state.lock().unwrap().caps.max_deposit_value = BigUint::from(value);
    }

    pub fn set_undistributed(&self, value: u64) {
        self.state.lock().unwrap().vault.undistributed = BigUint::from(value);
    }

    pub fn set_vault_paused(&self, paused: bool) {
        self.state.lock().unwrap().vault.paused = paused;
    }

    pub fn set_router_paused(&self, paused: bool) {
        self.state.lock().unwrap().router_paused = paused;
    }

    pub fn fail_vault(&self, err: ChainError) {
        self.state.lock().unwrap().vault_error = Some(err);
    }

    /// Total read calls served
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn strategy_reads(&self) -> usize {
        self.strategy_reads.load(Ordering::SeqCst)
    }

    /// Most `pool_reserves` calls ever running at once
    pub fn max_reserve_reads_in_flight(&self) -> usize {
        self.max_reserve_reads_in_flight.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn strategy_state(&self, strategy: &Pubkey) -> Result<StrategyState, ChainError> {
        self.count();
        self.strategy_reads.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .strategies
            .get(strategy)
            .cloned()
            .ok_or_else(|| ChainError::AccountNotFound(strategy.to_string()))
    }

    async fn user_shares(&self, strategy: &Pubkey, user: &Pubkey) -> Result<BigUint, ChainError> {
        self.count();
        Ok(self
            .state
            .lock()
            .unwrap()
            .positions
            .iter()
            .find(|(s, u, _)| s == strategy && u == user)
            .map(|(_, _, shares)| shares.clone())
            .unwrap_or_else(BigUint::zero))
    }

    async fn convert_to_assets(&self, strategy: &Pubkey, shares: &BigUint) -> Result<BigUint, ChainError> {
        let state = self.strategy_state(strategy).await?;
        if state.total_shares.is_zero() {
            return Ok(shares.clone());
        }
        Ok(shares * &state.total_assets / &state.total_shares)
    }

    async fn vault_state(&self, _token: &Pubkey) -> Result<VaultState, ChainError> {
        self.count();
        let state = self.state.lock().unwrap();
        match &state.vault_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.vault.clone()),
        }
    }

    async fn token_caps(&self, _token: &Pubkey) -> Result<TokenCaps, ChainError> {
        self.count();
        Ok(self.state.lock().unwrap().caps.clone())
    }

    async fn router_paused(&self) -> Result<bool, ChainError> {
        self.count();
        Ok(self.state.lock().unwrap().router_paused)
    }

    async fn pool_reserves(&self, strategy: &Pubkey) -> Result<PoolReserves, ChainError> {
        self.count();
        let now = self.reserve_reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_reserve_reads_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.reserve_reads_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .reserves
            .get(strategy)
            .cloned()
            .ok_or_else(|| ChainError::AccountNotFound(format!("reserves of {}", strategy)))
    }

    async fn quote_amount_out(
        &self,
        strategy: &Pubkey,
        _token_in: &Pubkey,
        amount_in: &BigUint,
    ) -> Result<BigUint, ChainError> {
        self.count();
        let quote = self.state.lock().unwrap().quotes.get(strategy).copied();
        Ok(quote.map(BigUint::from).unwrap_or_else(|| amount_in.clone()))
    }

    async fn position_holders(&self, _token: &Pubkey) -> Result<Vec<Pubkey>, ChainError> {
        self.count();
        let state = self.state.lock().unwrap();
        let mut holders = Vec::new();
        for (_, user, shares) in &state.positions {
            if !shares.is_zero() && !holders.contains(user) {
                holders.push(*user);
            }
        }
        Ok(holders)
    }
}

#[derive(Default)]
struct WriterState {
    allocations: Vec<AllocateCall>,
    rebalances: Vec<RebalanceCall>,
    failing: HashSet<Pubkey>,
    reverting: HashSet<Pubkey>,
    no_receipt: HashSet<Pubkey>,
    receipts: HashMap<Signature, bool>,
    sent: Vec<Signature>,
}

/// Protocol writer that records calls instead of sending them. Every
/// network-facing call yields once so overlapping callers can interleave.
pub struct FakeWriter {
    state: Mutex<WriterState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeWriter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WriterState::default()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sends to `strategy` are rejected by the node
    pub fn fail_sends_for(&self, strategy: Pubkey) {
        self.state.lock().unwrap().failing.insert(strategy);
    }

    /// Sends to `strategy` land but fail on chain
    pub fn revert_for(&self, strategy: Pubkey) {
        self.state.lock().unwrap().reverting.insert(strategy);
    }

    /// Sends to `strategy` never produce a receipt
    pub fn drop_receipts_for(&self, strategy: Pubkey) {
        self.state.lock().unwrap().no_receipt.insert(strategy);
    }

    pub fn allocations(&self) -> Vec<AllocateCall> {
        self.state.lock().unwrap().allocations.clone()
    }

    pub fn rebalances(&self) -> Vec<RebalanceCall> {
        self.state.lock().unwrap().rebalances.clone()
    }

    /// Signatures of every accepted send, in order
    pub fn sent(&self) -> Vec<Signature> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Most sends and receipt waits ever running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn on_the_wire(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn land(&self, strategy: &Pubkey) -> Result<Signature, ChainError> {
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(strategy) {
            return Err(ChainError::Send("node rejected transaction".to_string()));
        }
        let signature = Signature::new_unique();
        if !state.no_receipt.contains(strategy) {
            let success = !state.reverting.contains(strategy);
            state.receipts.insert(signature, success);
        }
        state.sent.push(signature);
        Ok(signature)
    }
}

#[async_trait]
impl ProtocolWriter for FakeWriter {
    async fn send_allocate(&self, call: &AllocateCall) -> Result<Signature, ChainError> {
        self.state.lock().unwrap().allocations.push(call.clone());
        self.on_the_wire().await;
        self.land(&call.strategy)
    }

    async fn send_rebalance(&self, call: &RebalanceCall) -> Result<Signature, ChainError> {
        self.state.lock().unwrap().rebalances.push(call.clone());
        self.on_the_wire().await;
        self.land(&call.strategy)
    }

    async fn await_receipt(&self, signature: &Signature) -> Result<TxReceipt, ChainError> {
        self.on_the_wire().await;
        let success = self.state.lock().unwrap().receipts.get(signature).copied();
        match success {
            Some(success) => Ok(TxReceipt {
                signature: *signature,
                success,
                error: (!success).then(|| "custom program error: 0x1".to_string()),
            }),
            None => Err(ChainError::ReceiptTimeout(1)),
        }
    }
}

//! Fan-out reads of per-pool state and validation into snapshots

use std::sync::Arc;

use futures::future::FutureExt;
use futures::stream::{self, StreamExt};
use num_bigint::BigUint;
use num_traits::Zero;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use super::{PoolConfig, PoolSnapshot};
use crate::domain::chain::{ChainReader, TokenCaps, VaultState};
use crate::shared::errors::OperationError;
use crate::shared::utils::apply_bps;

/// Result of one aggregation pass
#[derive(Debug, Default)]
pub struct AggregationReport {
    /// Validated snapshots, in candidate order
    pub snapshots: Vec<PoolSnapshot>,
    /// Excluded pools and the reason
    pub rejected: Vec<(String, OperationError)>,
}

/// Reads on-chain state for candidate pools and keeps the ones that validate
pub struct StateAggregator {
    reader: Arc<dyn ChainReader>,
    max_concurrent_reads: usize,
}

impl StateAggregator {
    pub fn new(reader: Arc<dyn ChainReader>, max_concurrent_reads: usize) -> Self {
        Self {
            reader,
            max_concurrent_reads: max_concurrent_reads.max(1),
        }
    }

    /// Validate every candidate against `token`. A failing candidate is
    /// dropped from the result; the rest of the batch is unaffected.
    pub async fn aggregate(
        &self,
        token: &Pubkey,
        candidates: &[PoolConfig],
        user: Option<&Pubkey>,
    ) -> AggregationReport {
        let mut report = AggregationReport::default();

        let token_state = tokio::try_join!(self.reader.vault_state(token), self.reader.token_caps(token));
        let (vault, caps) = match token_state {
            Ok(state) => state,
            Err(e) => {
                warn!(token = %token, error = %e, "vault state unavailable, no pool can be evaluated");
                report.rejected = candidates
                    .iter()
                    .map(|p| (p.name.clone(), OperationError::read(&p.name, e.clone())))
                    .collect();
                return report;
            }
        };

        let evaluations: Vec<_> = candidates
            .iter()
            .map(|pool| {
                let vault = &vault;
                let caps = &caps;
                async move {
                    let result = self.evaluate(token, pool, user, vault, caps).await;
                    (pool.name.clone(), result)
                }
                .boxed()
            })
            .collect();
        let results: Vec<(String, Result<PoolSnapshot, OperationError>)> = stream::iter(evaluations)
            .buffered(self.max_concurrent_reads)
            .collect()
            .await;

        for (name, result) in results {
            match result {
                Ok(snapshot) => {
                    debug!(pool = %name, tvl = %snapshot.tvl, room = %snapshot.liquidity_room, "pool validated");
                    report.snapshots.push(snapshot);
                }
                Err(e) => {
                    warn!(pool = %name, error = %e, "pool excluded from evaluation");
                    report.rejected.push((name, e));
                }
            }
        }

        report
    }

    async fn evaluate(
        &self,
        token: &Pubkey,
        pool: &PoolConfig,
        user: Option<&Pubkey>,
        vault: &VaultState,
        caps: &TokenCaps,
    ) -> Result<PoolSnapshot, OperationError> {
        if !pool.is_active() {
            return Err(OperationError::mismatch(&pool.name, "pool is paused in the registry"));
        }

        let state = self
            .reader
            .strategy_state(&pool.strategy)
            .await
            .map_err(|e| OperationError::read(&pool.name, e))?;

        if !state.is_active {
            return Err(OperationError::mismatch(&pool.name, "strategy is not active"));
        }
        if state.underlying_mint != *token && pool.swap_path.is_none() {
            return Err(OperationError::mismatch(
                &pool.name,
                format!("underlying asset {} does not match token {}", state.underlying_mint, token),
            ));
        }
        if state.base_mint != pool.base_token.mint || state.quote_mint != pool.quote_token.mint {
            return Err(OperationError::mismatch(
                &pool.name,
                format!(
                    "strategy pair {}-{} does not match registry pair {}",
                    state.base_mint,
                    state.quote_mint,
                    pool.pair()
                ),
            ));
        }

        let user_share_balance = match user {
            Some(user) => self
                .reader
                .user_shares(&pool.strategy, user)
                .await
                .map_err(|e| OperationError::read(&pool.name, e))?,
            None => BigUint::zero(),
        };

        let liquidity_room = liquidity_room(vault, caps, &state.total_assets);

        Ok(PoolSnapshot {
            pool: pool.clone(),
            tvl: state.tvl,
            total_assets: state.total_assets,
            user_share_balance,
            liquidity_room,
            base_decimals: pool.base_token.decimals,
            quote_decimals: pool.quote_token.decimals,
        })
    }
}

/// Headroom between a strategy's assets and the vault-wide percentage cap
pub fn liquidity_room(vault: &VaultState, caps: &TokenCaps, strategy_assets: &BigUint) -> BigUint {
    let cap = apply_bps(&vault.total_assets, caps.max_percent_liquidity_bps);
    if cap > *strategy_assets {
        cap - strategy_assets
    } else {
        BigUint::zero()
    }
}

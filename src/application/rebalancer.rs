//! Scheduled price-drift detection and position rebalancing

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::report::BatchReport;
use crate::domain::chain::{ensure_not_paused, ChainReader, TxReceipt};
use crate::domain::execution::{ActionType, TransactionLog, TransactionLogEntry, TransactionSubmitter, TxStatus};
use crate::domain::pool::{PoolConfig, PoolRegistry};
use crate::domain::price::{price_drop, reserve_price, DriftObservation, PriceCache, PriceKey};
use crate::shared::errors::{AppError, OperationError};

/// Rebalancer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RebalanceConfig {
    pub interval_secs: u64,
    /// Relative drop above which positions are rebalanced
    pub drop_threshold: f64,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            drop_threshold: 0.10,
        }
    }
}

impl RebalanceConfig {
    /// The interval must be positive and the threshold within `[0, 1)`
    pub fn validate(&self) -> Result<(), AppError> {
        if self.interval_secs == 0 {
            return Err(AppError::ConfigError("rebalance interval must be positive".to_string()));
        }
        if !self.drop_threshold.is_finite() || !(0.0..1.0).contains(&self.drop_threshold) {
            return Err(AppError::ConfigError(format!(
                "drop threshold {} must be in [0, 1)",
                self.drop_threshold
            )));
        }
        Ok(())
    }
}

/// What one tick observed and did
#[derive(Debug, Default)]
pub struct TickReport {
    pub observations: Vec<(String, DriftObservation)>,
    /// Pools whose price could not be read this tick
    pub skipped: Vec<(String, OperationError)>,
    pub rebalances: BatchReport<TxReceipt>,
}

#[derive(Debug)]
pub enum TickOutcome {
    /// A pause flag is set; the tick did nothing
    Paused(String),
    RegistryUnavailable(String),
    Completed(TickReport),
}

pub struct PriceDriftRebalancer {
    chain_id: String,
    supported_tokens: Vec<Pubkey>,
    registry: Arc<dyn PoolRegistry>,
    reader: Arc<dyn ChainReader>,
    submitter: Arc<TransactionSubmitter>,
    log: Arc<dyn TransactionLog>,
    drop_threshold: f64,
    /// Held for the whole tick, which also serializes ticks
    cache: Mutex<PriceCache>,
}

impl PriceDriftRebalancer {
    pub fn new(
        chain_id: String,
        supported_tokens: Vec<Pubkey>,
        registry: Arc<dyn PoolRegistry>,
        reader: Arc<dyn ChainReader>,
        submitter: Arc<TransactionSubmitter>,
        log: Arc<dyn TransactionLog>,
        drop_threshold: f64,
    ) -> Self {
        Self {
            chain_id,
            supported_tokens,
            registry,
            reader,
            submitter,
            log,
            drop_threshold,
            cache: Mutex::new(PriceCache::new()),
        }
    }

    /// Current baseline prices
    pub async fn price_cache(&self) -> PriceCache {
        self.cache.lock().await.clone()
    }

    pub async fn run_tick(&self) -> TickOutcome {
        let mut cache = self.cache.lock().await;

        for token in &self.supported_tokens {
            if let Err(e) = ensure_not_paused(self.reader.as_ref(), token).await {
                warn!(token = %token, error = %e, "rebalance tick skipped");
                return TickOutcome::Paused(e.to_string());
            }
        }

        let pools = match self.registry.pools_for_chain(&self.chain_id).await {
            Ok(pools) => pools,
            Err(e) => {
                error!(chain = %self.chain_id, error = %e, "pool registry unavailable");
                return TickOutcome::RegistryUnavailable(e.to_string());
            }
        };

        let mut report = TickReport::default();

        let mut drifting: Vec<&PoolConfig> = Vec::new();
        for pool in &pools {
            let reserves = match self.reader.pool_reserves(&pool.strategy).await {
                Ok(reserves) => reserves,
                Err(e) => {
                    warn!(pool = %pool.name, error = %e, "reserves unavailable");
                    report.skipped.push((pool.name.clone(), OperationError::read(&pool.name, e)));
                    continue;
                }
            };
            let current = match reserve_price(&reserves) {
                Ok(price) => price,
                Err(e) => {
                    warn!(pool = %pool.name, error = %e, "price unavailable");
                    report
                        .skipped
                        .push((pool.name.clone(), OperationError::mismatch(&pool.name, e.to_string())));
                    continue;
                }
            };

            let key = PriceKey::new(pool.pair(), pool.strategy);
            let previous = cache
                .record(key, current, Utc::now())
                .map(|p| p.price)
                .unwrap_or(current);

            let observation = DriftObservation {
                pair: key.pair,
                previous,
                current,
                drop: price_drop(previous, current),
            };
            debug!(pool = %pool.name, previous, current, drop = observation.drop, "price observed");
            if observation.exceeds(self.drop_threshold) {
                info!(pool = %pool.name, previous, current, drop = observation.drop, "price drift above threshold");
                drifting.push(pool);
            }
            report.observations.push((pool.name.clone(), observation));
        }

        if drifting.is_empty() {
            return TickOutcome::Completed(report);
        }

        let users = self.position_holders().await;
        for user in &users {
            for pool in &drifting {
                if let Some(result) = self.rebalance_user(pool, user).await {
                    report.rebalances.push(format!("{}/{}", pool.name, user), result);
                }
            }
        }

        info!(
            drifting = drifting.len(),
            users = users.len(),
            succeeded = report.rebalances.succeeded(),
            failed = report.rebalances.failed(),
            "rebalance tick finished"
        );
        TickOutcome::Completed(report)
    }

    async fn position_holders(&self) -> Vec<Pubkey> {
        let mut users = Vec::new();
        for token in &self.supported_tokens {
            match self.reader.position_holders(token).await {
                Ok(holders) => {
                    for holder in holders {
                        if !users.contains(&holder) {
                            users.push(holder);
                        }
                    }
                }
                Err(e) => warn!(token = %token, error = %e, "position holders unavailable"),
            }
        }
        users
    }

    /// `None` when the user has nothing in the pool, so nothing was attempted
    async fn rebalance_user(&self, pool: &PoolConfig, user: &Pubkey) -> Option<Result<TxReceipt, OperationError>> {
        let shares = match self.reader.user_shares(&pool.strategy, user).await {
            Ok(shares) => shares,
            Err(e) => {
                warn!(pool = %pool.name, user = %user, error = %e, "share balance unavailable");
                return Some(Err(OperationError::read(&pool.name, e)));
            }
        };
        if shares.is_zero() {
            return None;
        }
        let amount = self.position_value(pool, &shares).await;
        let token = pool.base_token.mint;

        let result = self.submitter.rebalance(pool, &token, user).await;
        let (tx_hash, status, error) = match &result {
            Ok(receipt) => (
                Some(receipt.signature.to_string()),
                if receipt.success { TxStatus::Success } else { TxStatus::Failed },
                receipt.error.clone(),
            ),
            Err(e) => (None, TxStatus::Failed, Some(e.to_string())),
        };
        match status {
            TxStatus::Success => info!(pool = %pool.name, user = %user, amount = %amount, "position rebalanced"),
            TxStatus::Failed => warn!(pool = %pool.name, user = %user, error = ?error, "rebalance failed"),
        }

        let entry = TransactionLogEntry::new(
            *user,
            &pool.name,
            pool.strategy,
            ActionType::Rebalance,
            token,
            amount,
            tx_hash,
            status,
            error,
        );
        if let Err(e) = self.log.append(entry).await {
            error!(pool = %pool.name, user = %user, error = %e, "failed to record rebalance");
        }
        Some(match result {
            Ok(receipt) if !receipt.success => Err(OperationError::SubmissionFailure {
                pool: pool.name.clone(),
                reason: format!(
                    "transaction {} failed: {}",
                    receipt.signature,
                    receipt.error.unwrap_or_default()
                ),
            }),
            other => other,
        })
    }

    async fn position_value(&self, pool: &PoolConfig, shares: &BigUint) -> BigUint {
        match self.reader.convert_to_assets(&pool.strategy, shares).await {
            Ok(assets) => assets,
            Err(e) => {
                warn!(pool = %pool.name, error = %e, "share conversion failed, recording share amount");
                shares.clone()
            }
        }
    }
}

/// First tick runs immediately, then one every `period`. A slow tick
/// delays the next one instead of overlapping it.
pub async fn run_rebalance_schedule(rebalancer: Arc<PriceDriftRebalancer>, period: Duration) {
    info!(interval_secs = period.as_secs(), "rebalance scheduler started");
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match rebalancer.run_tick().await {
            TickOutcome::Completed(report) => {
                debug!(
                    observed = report.observations.len(),
                    skipped = report.skipped.len(),
                    rebalances = report.rebalances.len(),
                    "tick completed"
                );
            }
            outcome => debug!(?outcome, "tick ended early"),
        }
    }
}

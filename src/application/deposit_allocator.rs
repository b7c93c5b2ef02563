//! Deposit-triggered allocation: one event in, one batch of allocations out

use std::collections::HashSet;
use std::sync::Arc;

use num_bigint::BigUint;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::report::BatchReport;
use crate::domain::allocation::{score_pools, AllocationPolicy, PlannedAllocation, ScoringWeights};
use crate::domain::chain::{ensure_not_paused, ChainReader};
use crate::domain::execution::{
    ActionType, TransactionLog, TransactionLogEntry, TransactionSubmitter, TransactionValidator, TxStatus,
};
use crate::domain::pool::{PoolRegistry, StateAggregator};
use crate::shared::errors::OperationError;
use crate::shared::types::DepositEvent;

/// How a deposit event ended
#[derive(Debug)]
pub enum DepositOutcome {
    /// Token is not handled by this keeper; nothing was read or written
    UnsupportedToken,
    /// A pause flag is set; nothing was submitted
    Paused(String),
    RegistryUnavailable(String),
    /// No candidate pool passed validation
    NoValidPools,
    /// Valid pools exist but the plan is empty (dust deposit or no undistributed balance)
    NothingToAllocate,
    Allocated(BatchReport<Signature>),
}

pub struct DepositAllocator {
    chain_id: String,
    supported_tokens: HashSet<Pubkey>,
    registry: Arc<dyn PoolRegistry>,
    reader: Arc<dyn ChainReader>,
    aggregator: StateAggregator,
    validator: TransactionValidator,
    submitter: Arc<TransactionSubmitter>,
    log: Arc<dyn TransactionLog>,
    weights: ScoringWeights,
    policy: AllocationPolicy,
}

impl DepositAllocator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain_id: String,
        supported_tokens: impl IntoIterator<Item = Pubkey>,
        registry: Arc<dyn PoolRegistry>,
        reader: Arc<dyn ChainReader>,
        submitter: Arc<TransactionSubmitter>,
        log: Arc<dyn TransactionLog>,
        weights: ScoringWeights,
        policy: AllocationPolicy,
        max_concurrent_reads: usize,
    ) -> Self {
        Self {
            chain_id,
            supported_tokens: supported_tokens.into_iter().collect(),
            registry,
            aggregator: StateAggregator::new(reader.clone(), max_concurrent_reads),
            validator: TransactionValidator::new(reader.clone()),
            reader,
            submitter,
            log,
            weights,
            policy,
        }
    }

    pub async fn handle(&self, event: &DepositEvent) -> DepositOutcome {
        // Validating
        if !self.supported_tokens.contains(&event.token) {
            debug!(token = %event.token, "ignoring deposit of unsupported token");
            return DepositOutcome::UnsupportedToken;
        }
        if let Err(e) = ensure_not_paused(self.reader.as_ref(), &event.token).await {
            warn!(token = %event.token, error = %e, "deposit allocation aborted");
            return DepositOutcome::Paused(e.to_string());
        }

        // Aggregating
        let candidates = match self.registry.pools_for_chain(&self.chain_id).await {
            Ok(pools) => pools,
            Err(e) => {
                error!(chain = %self.chain_id, error = %e, "pool registry unavailable");
                return DepositOutcome::RegistryUnavailable(e.to_string());
            }
        };
        let report = self
            .aggregator
            .aggregate(&event.token, &candidates, Some(&event.receiver))
            .await;
        debug!(
            candidates = candidates.len(),
            valid = report.snapshots.len(),
            rejected = report.rejected.len(),
            "aggregation finished"
        );

        // Allocating
        if report.snapshots.is_empty() {
            info!(token = %event.token, "no valid pool for deposit, nothing allocated");
            return DepositOutcome::NoValidPools;
        }
        let available = match self.reader.vault_state(&event.token).await {
            Ok(vault) => vault.undistributed,
            Err(e) => {
                warn!(token = %event.token, error = %e, "undistributed balance unreadable");
                return DepositOutcome::NothingToAllocate;
            }
        };
        let ranked = score_pools(report.snapshots, &self.weights);
        let deposit_amount = BigUint::from(event.actual_amount);
        let plan = self.policy.plan(&ranked, &deposit_amount, &available);
        if plan.is_empty() {
            info!(amount = event.actual_amount, available = %available, "allocation plan is empty");
            return DepositOutcome::NothingToAllocate;
        }
        info!(
            receiver = %event.receiver,
            amount = event.actual_amount,
            pools = plan.len(),
            total = %plan.total(),
            "allocating deposit"
        );

        // Submitting
        let mut batch = BatchReport::new();
        for entry in &plan.entries {
            let result = self.submit(event, entry).await;
            batch.push(entry.pool.name.clone(), result);
        }
        info!(
            succeeded = batch.succeeded(),
            failed = batch.failed(),
            "deposit allocation finished"
        );
        DepositOutcome::Allocated(batch)
    }

    async fn submit(&self, event: &DepositEvent, entry: &PlannedAllocation) -> Result<Signature, OperationError> {
        let pool = &entry.pool;
        if let Err(e) = self.validator.validate_allocation(pool, &event.token, &entry.amount).await {
            warn!(pool = %pool.name, amount = %entry.amount, error = %e, "allocation skipped");
            return Err(e);
        }

        let result = self
            .submitter
            .allocate(pool, &event.token, &event.receiver, &entry.amount)
            .await;

        // only attempts that reached the submitter are recorded
        let recorded = match &result {
            Ok(signature) => Some((Some(signature.to_string()), TxStatus::Success, None)),
            Err(e @ OperationError::SubmissionFailure { .. }) => Some((None, TxStatus::Failed, Some(e.to_string()))),
            Err(_) => None,
        };
        let Some((tx_hash, status, error)) = recorded else {
            return result;
        };
        let log_entry = TransactionLogEntry::new(
            event.receiver,
            &pool.name,
            pool.strategy,
            ActionType::Allocate,
            event.token,
            entry.amount.clone(),
            tx_hash,
            status,
            error,
        );
        if let Err(e) = self.log.append(log_entry).await {
            error!(pool = %pool.name, error = %e, "failed to record allocation");
        }
        result
    }
}

/// Single consumer of deposit events. Each event is fully handled before
/// the next one is received, so plans never race for the same balance.
pub async fn run_deposit_loop(allocator: Arc<DepositAllocator>, mut events: mpsc::Receiver<DepositEvent>) {
    info!("deposit allocation loop started");
    while let Some(event) = events.recv().await {
        info!(
            token = %event.token,
            receiver = %event.receiver,
            amount = event.amount,
            actual_amount = event.actual_amount,
            "deposit event received"
        );
        match allocator.handle(&event).await {
            DepositOutcome::Allocated(report) => {
                for (pool, e) in report.failures() {
                    warn!(pool, error = %e, "allocation did not go through");
                }
            }
            outcome => debug!(?outcome, "deposit handled without allocation"),
        }
    }
    info!("deposit channel closed, allocation loop stopped");
}

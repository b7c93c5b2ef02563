//! Submits protocol writes through the single keeper signer

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::domain::chain::{AllocateCall, ChainReader, ProtocolWriter, RebalanceCall, SwapParams, TxReceipt};
use crate::domain::pool::PoolConfig;
use crate::shared::errors::OperationError;
use crate::shared::utils::apply_bps;

/// Transaction execution configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Compute unit ceiling for `allocate_deposit`
    pub allocate_compute_units: u32,
    /// Compute unit ceiling for `rebalance_position`
    pub rebalance_compute_units: u32,
    pub distribution_fee: u64,
    pub rebalance_fee: u64,
    pub referral: bool,
    pub receipt_timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            allocate_compute_units: 400_000,
            rebalance_compute_units: 600_000,
            distribution_fee: 0,
            rebalance_fee: 0,
            referral: false,
            receipt_timeout_secs: 60,
        }
    }
}

/// Serializes every write issued by the keeper, allocation and rebalance
/// alike, since they share one signing identity.
pub struct TransactionSubmitter {
    writer: Arc<dyn ProtocolWriter>,
    reader: Arc<dyn ChainReader>,
    config: ExecutionConfig,
    signing_lock: Mutex<()>,
}

impl TransactionSubmitter {
    pub fn new(writer: Arc<dyn ProtocolWriter>, reader: Arc<dyn ChainReader>, config: ExecutionConfig) -> Self {
        Self {
            writer,
            reader,
            config,
            signing_lock: Mutex::new(()),
        }
    }

    /// Send an `allocate_deposit` for `amount` of `token` into `pool`.
    /// Returns as soon as the transaction is accepted by the node.
    pub async fn allocate(
        &self,
        pool: &PoolConfig,
        token: &Pubkey,
        depositor: &Pubkey,
        amount: &BigUint,
    ) -> Result<Signature, OperationError> {
        let amount_u64 = amount
            .to_u64()
            .ok_or_else(|| OperationError::cap(&pool.name, format!("amount {} exceeds u64", amount)))?;
        let swap = self.swap_params(pool, token, amount, amount_u64).await?;

        let call = AllocateCall {
            strategy: pool.strategy,
            token: *token,
            depositor: *depositor,
            amount: amount_u64,
            fee: self.config.distribution_fee,
            swap,
            compute_units: self.config.allocate_compute_units,
        };

        let _guard = self.signing_lock.lock().await;
        match self.writer.send_allocate(&call).await {
            Ok(signature) => {
                info!(pool = %pool.name, amount = amount_u64, %signature, "allocation submitted");
                Ok(signature)
            }
            Err(e) => {
                error!(pool = %pool.name, amount = amount_u64, error = %e, "allocation submission failed");
                Err(OperationError::submission(&pool.name, e))
            }
        }
    }

    /// Send a `rebalance_position` for `user` in `pool` and wait for its receipt.
    /// A send the node rejects is an error; a missing receipt is a failed one.
    pub async fn rebalance(&self, pool: &PoolConfig, token: &Pubkey, user: &Pubkey) -> Result<TxReceipt, OperationError> {
        let call = RebalanceCall {
            strategy: pool.strategy,
            token: *token,
            user: *user,
            fee: self.config.rebalance_fee,
            referral: self.config.referral,
            compute_units: self.config.rebalance_compute_units,
        };

        // the lock covers confirmation too, so writes land in submission order
        let _guard = self.signing_lock.lock().await;
        let signature = self.writer.send_rebalance(&call).await.map_err(|e| {
            error!(pool = %pool.name, user = %user, error = %e, "rebalance submission failed");
            OperationError::submission(&pool.name, e)
        })?;

        // the transaction may still land, so an unconfirmed send keeps its signature
        match self.writer.await_receipt(&signature).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                error!(pool = %pool.name, user = %user, %signature, error = %e, "rebalance receipt unavailable");
                Ok(TxReceipt {
                    signature,
                    success: false,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    async fn swap_params(
        &self,
        pool: &PoolConfig,
        token: &Pubkey,
        amount: &BigUint,
        amount_u64: u64,
    ) -> Result<SwapParams, OperationError> {
        if pool.swap_path.is_none() {
            return Ok(SwapParams::default());
        }
        if amount_u64 < pool.min_swap_amount {
            return Err(OperationError::cap(
                &pool.name,
                format!("amount {} below minimum swap amount {}", amount_u64, pool.min_swap_amount),
            ));
        }

        let quote = self
            .reader
            .quote_amount_out(&pool.strategy, token, amount)
            .await
            .map_err(|e| OperationError::read(&pool.name, e))?;
        let min_out = apply_bps(&quote, 10_000u32.saturating_sub(pool.slippage_bps));
        let min_amount_out = min_out
            .to_u64()
            .ok_or_else(|| OperationError::cap(&pool.name, "quoted output exceeds u64"))?;

        Ok(SwapParams {
            enabled: true,
            min_amount_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{pool_config, usdc, FakeChain, FakeWriter};

    fn submitter(chain: Arc<FakeChain>, writer: Arc<FakeWriter>) -> TransactionSubmitter {
        TransactionSubmitter::new(writer, chain, ExecutionConfig::default())
    }

    #[tokio::test]
    async fn test_allocate_builds_zero_fee_call() {
        let chain = Arc::new(FakeChain::new());
        let writer = Arc::new(FakeWriter::new());
        let pool = pool_config("a");
        let depositor = Pubkey::new_unique();

        submitter(chain, writer.clone())
            .allocate(&pool, &usdc(), &depositor, &BigUint::from(500u64))
            .await
            .unwrap();

        let calls = writer.allocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].amount, 500);
        assert_eq!(calls[0].fee, 0);
        assert_eq!(calls[0].compute_units, 400_000);
        assert!(!calls[0].swap.enabled);
    }

    #[tokio::test]
    async fn test_allocate_send_failure_is_typed() {
        let chain = Arc::new(FakeChain::new());
        let writer = Arc::new(FakeWriter::new());
        let pool = pool_config("a");
        writer.fail_sends_for(pool.strategy);

        let err = submitter(chain, writer)
            .allocate(&pool, &usdc(), &Pubkey::new_unique(), &BigUint::from(500u64))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::SubmissionFailure { .. }));
    }

    #[tokio::test]
    async fn test_swap_path_sets_min_amount_out() {
        let chain = Arc::new(FakeChain::new());
        let writer = Arc::new(FakeWriter::new());
        let mut pool = pool_config("swap");
        pool.swap_path = Some("usdc->sol".to_string());
        pool.min_swap_amount = 100;
        pool.slippage_bps = 100;
        chain.set_quote(&pool.strategy, 1_000);

        let s = submitter(chain, writer.clone());
        s.allocate(&pool, &usdc(), &Pubkey::new_unique(), &BigUint::from(500u64))
            .await
            .unwrap();
        let swap = &writer.allocations()[0].swap;
        assert!(swap.enabled);
        assert_eq!(swap.min_amount_out, 990);

        let err = s
            .allocate(&pool, &usdc(), &Pubkey::new_unique(), &BigUint::from(50u64))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::CapViolation { .. }));
    }

    #[tokio::test]
    async fn test_rebalance_reports_receipt_outcome() {
        let chain = Arc::new(FakeChain::new());
        let writer = Arc::new(FakeWriter::new());
        let pool = pool_config("a");
        let user = Pubkey::new_unique();
        writer.revert_for(pool.strategy);

        let receipt = submitter(chain, writer.clone()).rebalance(&pool, &usdc(), &user).await.unwrap();
        assert!(!receipt.success);
        let calls = writer.rebalances();
        assert_eq!(calls[0].user, user);
        assert_eq!(calls[0].fee, 0);
        assert!(!calls[0].referral);
        assert_eq!(calls[0].compute_units, 600_000);
    }

    #[tokio::test]
    async fn test_missing_receipt_keeps_signature() {
        let chain = Arc::new(FakeChain::new());
        let writer = Arc::new(FakeWriter::new());
        let pool = pool_config("a");
        writer.drop_receipts_for(pool.strategy);

        let receipt = submitter(chain, writer.clone())
            .rebalance(&pool, &usdc(), &Pubkey::new_unique())
            .await
            .unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.signature, writer.sent()[0]);
        assert!(receipt.error.unwrap().contains("Receipt not available"));
    }

    #[tokio::test]
    async fn test_allocations_and_rebalances_never_overlap() {
        let chain = Arc::new(FakeChain::new());
        let writer = Arc::new(FakeWriter::new());
        let pool = pool_config("a");
        let s = submitter(chain, writer.clone());
        let amount = BigUint::from(500u64);

        let (token_1, user_1) = (usdc(), Pubkey::new_unique());
        let (token_2, user_2) = (usdc(), Pubkey::new_unique());
        let (token_3, user_3) = (usdc(), Pubkey::new_unique());
        let (first, rebalanced, second) = tokio::join!(
            s.allocate(&pool, &token_1, &user_1, &amount),
            s.rebalance(&pool, &token_2, &user_2),
            s.allocate(&pool, &token_3, &user_3, &amount),
        );
        first.unwrap();
        second.unwrap();
        assert!(rebalanced.unwrap().success);

        assert_eq!(writer.allocations().len(), 2);
        assert_eq!(writer.rebalances().len(), 1);
        assert_eq!(writer.max_in_flight(), 1);
    }
}

//! Protocol cap checks run right before an allocation is submitted

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;
use solana_sdk::pubkey::Pubkey;

use crate::domain::chain::ChainReader;
use crate::domain::pool::{liquidity_room, PoolConfig};
use crate::shared::errors::OperationError;

/// Re-reads caps and strategy state so a planned amount is checked against
/// the chain as it is at submission time, not as it was when planned.
pub struct TransactionValidator {
    reader: Arc<dyn ChainReader>,
}

impl TransactionValidator {
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    /// `CapViolation` when the amount breaks the per-token caps. No smaller
    /// amount is suggested.
    pub async fn validate_allocation(
        &self,
        pool: &PoolConfig,
        token: &Pubkey,
        amount: &BigUint,
    ) -> Result<(), OperationError> {
        let (caps, vault, state) = tokio::try_join!(
            self.reader.token_caps(token),
            self.reader.vault_state(token),
            self.reader.strategy_state(&pool.strategy),
        )
        .map_err(|e| OperationError::read(&pool.name, e))?;

        // value in the strategy's underlying asset
        let value = if state.underlying_mint == *token {
            amount.clone()
        } else {
            self.reader
                .quote_amount_out(&pool.strategy, token, amount)
                .await
                .map_err(|e| OperationError::read(&pool.name, e))?
        };

        let room = liquidity_room(&vault, &caps, &state.total_assets);
        if value > room {
            return Err(OperationError::cap(
                &pool.name,
                format!(
                    "value {} exceeds liquidity room {} ({} bps cap)",
                    value, room, caps.max_percent_liquidity_bps
                ),
            ));
        }
        if !caps.max_deposit_value.is_zero() && value > caps.max_deposit_value {
            return Err(OperationError::cap(
                &pool.name,
                format!("value {} exceeds max deposit value {}", value, caps.max_deposit_value),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{pool_config, usdc, FakeChain};

    #[tokio::test]
    async fn test_within_caps() {
        let chain = Arc::new(FakeChain::new());
        let pool = pool_config("a");
        chain.add_strategy(&pool, 1_000, 100);

        let validator = TransactionValidator::new(chain);
        assert!(validator
            .validate_allocation(&pool, &usdc(), &BigUint::from(1_000u64))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_percent_liquidity_cap() {
        let chain = Arc::new(FakeChain::new());
        let pool = pool_config("a");
        // cap is 50% of 100_000
        chain.add_strategy(&pool, 1_000, 49_000);

        let validator = TransactionValidator::new(chain);
        let err = validator
            .validate_allocation(&pool, &usdc(), &BigUint::from(1_001u64))
            .await
            .unwrap_err();
        assert!(matches!(err, OperationError::CapViolation { .. }));
    }

    #[tokio::test]
    async fn test_max_deposit_value_cap() {
        let chain = Arc::new(FakeChain::new());
        let pool = pool_config("a");
        chain.add_strategy(&pool, 1_000, 0);
        chain.set_max_deposit_value(500);

        let validator = TransactionValidator::new(chain);
        assert!(validator
            .validate_allocation(&pool, &usdc(), &BigUint::from(500u64))
            .await
            .is_ok());
        assert!(matches!(
            validator
                .validate_allocation(&pool, &usdc(), &BigUint::from(501u64))
                .await,
            Err(OperationError::CapViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_foreign_token_is_valued_through_quote() {
        let chain = Arc::new(FakeChain::new());
        let mut pool = pool_config("swap");
        pool.swap_path = Some("usdc->sol".to_string());
        chain.add_strategy(&pool, 1_000, 0);
        chain.update_strategy(&pool.strategy, |s| s.underlying_mint = Pubkey::new_unique());
        chain.set_max_deposit_value(500);
        chain.set_quote(&pool.strategy, 600);

        let validator = TransactionValidator::new(chain);
        assert!(matches!(
            validator
                .validate_allocation(&pool, &usdc(), &BigUint::from(100u64))
                .await,
            Err(OperationError::CapViolation { .. })
        ));
    }
}

//! Registry of candidate pools

use async_trait::async_trait;

use super::PoolConfig;
use crate::shared::errors::AppError;

/// Source of registered pools. The keeper only reads from it.
#[async_trait]
pub trait PoolRegistry: Send + Sync {
    async fn all_pools(&self) -> Result<Vec<PoolConfig>, AppError>;

    async fn pools_for_chain(&self, chain_id: &str) -> Result<Vec<PoolConfig>, AppError> {
        Ok(self
            .all_pools()
            .await?
            .into_iter()
            .filter(|p| p.chain_id == chain_id)
            .collect())
    }
}

/// Registry loaded once from the configuration file
pub struct StaticPoolRegistry {
    pools: Vec<PoolConfig>,
}

impl StaticPoolRegistry {
    pub fn new(pools: Vec<PoolConfig>) -> Result<Self, AppError> {
        for (i, pool) in pools.iter().enumerate() {
            if pools[..i].iter().any(|p| p.strategy == pool.strategy) {
                return Err(AppError::RegistryError(format!(
                    "strategy {} registered twice (pool {})",
                    pool.strategy, pool.name
                )));
            }
        }
        Ok(Self { pools })
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[async_trait]
impl PoolRegistry for StaticPoolRegistry {
    async fn all_pools(&self) -> Result<Vec<PoolConfig>, AppError> {
        Ok(self.pools.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pool_config;

    #[tokio::test]
    async fn test_pools_for_chain_filters() {
        let mut devnet = pool_config("devnet-pool");
        devnet.chain_id = "devnet".to_string();
        let registry = StaticPoolRegistry::new(vec![pool_config("a"), devnet, pool_config("b")]).unwrap();

        let mainnet = registry.pools_for_chain("mainnet-beta").await.unwrap();
        let names: Vec<_> = mainnet.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_strategy_rejected() {
        let a = pool_config("a");
        let mut b = pool_config("b");
        b.strategy = a.strategy;
        assert!(StaticPoolRegistry::new(vec![a, b]).is_err());
    }
}

//! Turns a ranked pool list into a bounded allocation plan

use num_bigint::BigUint;
use num_traits::Zero;
use serde::Deserialize;

use super::ScoredPool;
use crate::domain::pool::PoolConfig;
use crate::shared::utils::apply_bps;

/// How much of a deposit goes out per event.
///
/// Defaults to 4 pools at 10% each, so at most 40% of a deposit is
/// distributed and the rest stays undistributed in the vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AllocationPolicy {
    pub max_pools: usize,
    pub per_pool_bps: u32,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            max_pools: 4,
            per_pool_bps: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAllocation {
    pub pool: PoolConfig,
    pub amount: BigUint,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllocationPlan {
    pub entries: Vec<PlannedAllocation>,
}

impl AllocationPlan {
    pub fn total(&self) -> BigUint {
        self.entries.iter().map(|e| &e.amount).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl AllocationPolicy {
    /// Plan allocations of `deposit_amount` over the best-ranked pools.
    /// The plan never spends more than `available`.
    pub fn plan(&self, ranked: &[ScoredPool], deposit_amount: &BigUint, available: &BigUint) -> AllocationPlan {
        let per_pool = apply_bps(deposit_amount, self.per_pool_bps);
        if per_pool.is_zero() {
            return AllocationPlan::default();
        }

        let mut plan = AllocationPlan::default();
        let mut committed = BigUint::zero();
        for scored in ranked.iter().take(self.max_pools) {
            let next = &committed + &per_pool;
            if next > *available {
                break;
            }
            committed = next;
            plan.entries.push(PlannedAllocation {
                pool: scored.snapshot.pool.clone(),
                amount: per_pool.clone(),
            });
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::{score_pools, ScoringWeights};
    use crate::test_support::snapshot;

    fn ranked(n: usize) -> Vec<ScoredPool> {
        let snaps = (0..n)
            .map(|i| snapshot(&format!("p{}", i), 1_000 * (n - i) as u64, 10))
            .collect();
        score_pools(snaps, &ScoringWeights::default())
    }

    #[test]
    fn test_selects_min_of_four_and_n() {
        let policy = AllocationPolicy::default();
        let amount = BigUint::from(1_000u64);
        let available = BigUint::from(1_000_000u64);

        for n in 0..7 {
            let plan = policy.plan(&ranked(n), &amount, &available);
            assert_eq!(plan.len(), n.min(4));
            assert!(plan.entries.iter().all(|e| e.amount == BigUint::from(100u64)));
        }
    }

    #[test]
    fn test_follows_ranking() {
        let plan = AllocationPolicy::default().plan(&ranked(6), &BigUint::from(1_000u64), &BigUint::from(10_000u64));
        let names: Vec<_> = plan.entries.iter().map(|e| e.pool.name.as_str()).collect();
        assert_eq!(names, vec!["p0", "p1", "p2", "p3"]);
        assert_eq!(plan.total(), BigUint::from(400u64));
    }

    #[test]
    fn test_never_exceeds_available_balance() {
        let plan = AllocationPolicy::default().plan(&ranked(4), &BigUint::from(1_000u64), &BigUint::from(250u64));
        assert_eq!(plan.len(), 2);
        assert!(plan.total() <= BigUint::from(250u64));
    }

    #[test]
    fn test_dust_deposit_yields_empty_plan() {
        let plan = AllocationPolicy::default().plan(&ranked(3), &BigUint::from(9u64), &BigUint::from(1_000u64));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_overridden_policy() {
        let policy = AllocationPolicy {
            max_pools: 2,
            per_pool_bps: 2_500,
        };
        let plan = policy.plan(&ranked(5), &BigUint::from(1_000u64), &BigUint::from(1_000u64));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.total(), BigUint::from(500u64));
    }
}

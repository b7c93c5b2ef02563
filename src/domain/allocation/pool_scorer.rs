//! Composite scoring and ranking of validated pools

use num_bigint::BigUint;
use num_traits::Zero;
use serde::Deserialize;

use crate::domain::pool::PoolSnapshot;
use crate::shared::utils::ratio;

/// Relative weight of each score component. Policy, not a protocol rule.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub tvl: f64,
    pub liquidity_room: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            tvl: 0.6,
            liquidity_room: 0.4,
        }
    }
}

/// Snapshot with its scores, 0..=100 per component
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPool {
    pub snapshot: PoolSnapshot,
    pub tvl_score: f64,
    pub liquidity_room_score: f64,
    pub composite: f64,
}

/// Score every snapshot relative to the best in the set and rank them
/// best-first. Ties keep candidate order.
pub fn score_pools(snapshots: Vec<PoolSnapshot>, weights: &ScoringWeights) -> Vec<ScoredPool> {
    let max_tvl = snapshots.iter().map(|s| &s.tvl).max().cloned().unwrap_or_else(BigUint::zero);
    let max_room = snapshots
        .iter()
        .map(|s| &s.liquidity_room)
        .max()
        .cloned()
        .unwrap_or_else(BigUint::zero);

    let mut scored: Vec<ScoredPool> = snapshots
        .into_iter()
        .map(|snapshot| {
            let tvl_score = ratio(&snapshot.tvl, &max_tvl) * 100.0;
            let liquidity_room_score = ratio(&snapshot.liquidity_room, &max_room) * 100.0;
            let composite = weights.tvl * tvl_score + weights.liquidity_room * liquidity_room_score;
            ScoredPool {
                snapshot,
                tvl_score,
                liquidity_room_score,
                composite,
            }
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.composite.total_cmp(&a.composite));
    scored
}

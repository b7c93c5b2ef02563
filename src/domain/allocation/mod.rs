//! Allocation domain - pool ranking and deposit distribution

mod allocation_planner;
mod pool_scorer;

pub use allocation_planner::{AllocationPlan, AllocationPolicy, PlannedAllocation};
pub use pool_scorer::{score_pools, ScoredPool, ScoringWeights};

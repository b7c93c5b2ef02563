//! Application layer - deposit allocation and drift rebalancing workflows

pub mod deposit_allocator;
pub mod rebalancer;
pub mod report;

pub use deposit_allocator::{run_deposit_loop, DepositAllocator, DepositOutcome};
pub use rebalancer::{run_rebalance_schedule, PriceDriftRebalancer, RebalanceConfig, TickOutcome, TickReport};
pub use report::{BatchReport, OperationRecord};

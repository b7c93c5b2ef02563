//! Domain layer - core allocation and rebalancing logic

pub mod allocation;
pub mod chain;
pub mod execution;
pub mod pool;
pub mod price;

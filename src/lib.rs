//! Vaultkeeper - deposit allocation and price-drift rebalancing for a Solana yield vault

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

#[cfg(test)]
mod test_support;

pub use application::{DepositAllocator, PriceDriftRebalancer};
pub use domain::chain::{ChainReader, ProtocolWriter};
pub use domain::pool::{PoolRegistry, StaticPoolRegistry};

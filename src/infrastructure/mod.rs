//! Infrastructure layer - Solana RPC binding and log storage

pub mod blockchain;
pub mod storage;

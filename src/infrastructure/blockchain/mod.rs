//! Solana binding of the chain ports

pub mod event_listener;
pub mod protocol_structures;
pub mod rpc_client;
pub mod transaction_executor;

pub use event_listener::{parse_deposit_events, DepositEventListener};
pub use protocol_structures::ProtocolAddresses;
pub use rpc_client::{connect, SolanaChainReader};
pub use transaction_executor::SolanaProtocolWriter;

//! Durable storage for keeper records

pub mod jsonl_log;

pub use jsonl_log::JsonlTransactionLog;

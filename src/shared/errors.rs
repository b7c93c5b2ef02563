//! Error handling for the keeper

use thiserror::Error;

/// Transport-level failures talking to the chain
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Failed to decode account {account}: {reason}")]
    Decode { account: String, reason: String },

    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("Transaction send failed: {0}")]
    Send(String),

    #[error("Receipt not available after {0}s")]
    ReceiptTimeout(u64),

    #[error("Invalid chain data: {0}")]
    InvalidData(String),
}

/// Per-operation failure taxonomy.
///
/// Each variant is contained at the smallest scope that produced it: one
/// pool, one allocation or one (user, pool) pair. Only `GlobalPause` stops a
/// whole flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("Configuration mismatch for pool {pool}: {reason}")]
    ConfigurationMismatch { pool: String, reason: String },

    #[error("Read failed for pool {pool}: {reason}")]
    TransientReadFailure { pool: String, reason: String },

    #[error("Submission failed for pool {pool}: {reason}")]
    SubmissionFailure { pool: String, reason: String },

    #[error("Cap violation for pool {pool}: {reason}")]
    CapViolation { pool: String, reason: String },

    #[error("Protocol paused: {0}")]
    GlobalPause(String),
}

impl OperationError {
    pub fn mismatch(pool: &str, reason: impl Into<String>) -> Self {
        OperationError::ConfigurationMismatch {
            pool: pool.to_string(),
            reason: reason.into(),
        }
    }

    pub fn read(pool: &str, err: ChainError) -> Self {
        OperationError::TransientReadFailure {
            pool: pool.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn submission(pool: &str, err: ChainError) -> Self {
        OperationError::SubmissionFailure {
            pool: pool.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn cap(pool: &str, reason: impl Into<String>) -> Self {
        OperationError::CapViolation {
            pool: pool.to_string(),
            reason: reason.into(),
        }
    }
}

/// Price computation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("Base reserve is empty")]
    EmptyReserve,

    #[error("Price calculation failed")]
    CalculationFailed,
}

/// Transaction log persistence errors
#[derive(Error, Debug)]
pub enum LogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// General application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Blockchain error: {0}")]
    BlockchainError(String),
}

impl From<ChainError> for AppError {
    fn from(err: ChainError) -> Self {
        AppError::BlockchainError(err.to_string())
    }
}

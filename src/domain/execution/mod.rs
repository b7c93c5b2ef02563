//! Execution domain - submission, pre-submission validation and the transaction log

mod transaction_log;
mod transaction_submitter;
mod transaction_validator;

pub use transaction_log::{ActionType, MemoryTransactionLog, TransactionLog, TransactionLogEntry, TxStatus};
pub use transaction_submitter::{ExecutionConfig, TransactionSubmitter};
pub use transaction_validator::TransactionValidator;

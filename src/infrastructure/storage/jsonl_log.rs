//! Transaction log as a JSON Lines file

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::execution::{TransactionLog, TransactionLogEntry};
use crate::shared::errors::LogError;

/// Appends one JSON object per line; existing lines are never touched
pub struct JsonlTransactionLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlTransactionLog {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TransactionLog for JsonlTransactionLog {
    async fn append(&self, entry: TransactionLogEntry) -> Result<(), LogError> {
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        debug!(id = %entry.id, path = %self.path.display(), "log entry appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::{ActionType, TxStatus};
    use num_bigint::BigUint;
    use solana_sdk::pubkey::Pubkey;

    fn entry(pool: &str, status: TxStatus) -> TransactionLogEntry {
        TransactionLogEntry::new(
            Pubkey::new_unique(),
            pool,
            Pubkey::new_unique(),
            ActionType::Allocate,
            Pubkey::new_unique(),
            BigUint::from(123_456_789_000_000_000_000u128),
            Some("5sig".to_string()),
            status,
            None,
        )
    }

    #[tokio::test]
    async fn test_entries_are_appended_as_lines() {
        let path = std::env::temp_dir().join(format!("vaultkeeper-{}.jsonl", uuid::Uuid::new_v4()));
        let first = entry("a", TxStatus::Success);
        let second = entry("b", TxStatus::Failed);
        {
            let log = JsonlTransactionLog::open(&path).await.unwrap();
            log.append(first.clone()).await.unwrap();
        }
        // reopening keeps earlier lines
        let log = JsonlTransactionLog::open(&path).await.unwrap();
        log.append(second.clone()).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let decoded: TransactionLogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(decoded, first);
        let decoded: TransactionLogEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(decoded.status, TxStatus::Failed);
        assert!(lines[0].contains("\"amount\":\"123456789000000000000\""));

        tokio::fs::remove_file(&path).await.unwrap();
    }
}

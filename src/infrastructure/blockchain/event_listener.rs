//! Deposit event stream from the vault program's logs

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::StreamExt;
use solana_client::nonblocking::pubsub_client::PubsubClient;
use solana_client::rpc_config::{RpcTransactionLogsConfig, RpcTransactionLogsFilter};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::protocol_structures::DepositEventData;
use crate::shared::errors::ChainError;
use crate::shared::types::DepositEvent;

const PROGRAM_DATA_PREFIX: &str = "Program data: ";

/// Decode every `DepositEvent` carried in one transaction's log lines
pub fn parse_deposit_events(logs: &[String]) -> Vec<DepositEvent> {
    logs.iter()
        .filter_map(|line| line.strip_prefix(PROGRAM_DATA_PREFIX))
        .filter_map(|encoded| STANDARD.decode(encoded.trim()).ok())
        .filter_map(|payload| DepositEventData::try_decode(&payload))
        .collect()
}

pub struct DepositEventListener {
    ws_url: String,
    program_id: Pubkey,
    reconnect_delay: Duration,
}

impl DepositEventListener {
    pub fn new(ws_url: String, program_id: Pubkey, reconnect_delay: Duration) -> Self {
        Self {
            ws_url,
            program_id,
            reconnect_delay,
        }
    }

    /// Forward deposit events until the receiving side goes away,
    /// resubscribing after any stream failure
    pub async fn run(self, sender: mpsc::Sender<DepositEvent>) {
        loop {
            match self.stream_once(&sender).await {
                Ok(()) if sender.is_closed() => {
                    info!("deposit consumer gone, listener stopping");
                    return;
                }
                Ok(()) => warn!(url = %self.ws_url, "log subscription ended"),
                Err(e) => warn!(url = %self.ws_url, error = %e, "log subscription failed"),
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn stream_once(&self, sender: &mpsc::Sender<DepositEvent>) -> Result<(), ChainError> {
        let client = PubsubClient::new(&self.ws_url)
            .await
            .map_err(|e| ChainError::Rpc(format!("websocket connect failed: {}", e)))?;
        let (mut stream, unsubscribe) = client
            .logs_subscribe(
                RpcTransactionLogsFilter::Mentions(vec![self.program_id.to_string()]),
                RpcTransactionLogsConfig {
                    commitment: Some(CommitmentConfig::confirmed()),
                },
            )
            .await
            .map_err(|e| ChainError::Rpc(format!("logs subscribe failed: {}", e)))?;
        info!(program = %self.program_id, "subscribed to deposit events");

        while let Some(response) = stream.next().await {
            let logs = response.value;
            if logs.err.is_some() {
                continue;
            }
            for event in parse_deposit_events(&logs.logs) {
                debug!(signature = %logs.signature, token = %event.token, amount = event.actual_amount, "deposit event");
                if sender.send(event).await.is_err() {
                    unsubscribe().await;
                    return Ok(());
                }
            }
        }

        unsubscribe().await;
        Ok(())
    }
}

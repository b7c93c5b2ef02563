//! Signs and sends vault program instructions

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    system_program,
    transaction::Transaction,
};
use tracing::{debug, info, warn};

use super::protocol_structures::{instruction_data, AllocateDepositArgs, ProtocolAddresses, RebalancePositionArgs};
use super::rpc_client::SolanaChainReader;
use crate::domain::chain::{AllocateCall, ProtocolWriter, RebalanceCall, TxReceipt};
use crate::shared::errors::ChainError;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(500);

fn token_program() -> Pubkey {
    Pubkey::new_from_array(spl_token::id().to_bytes())
}

/// Protocol writer holding the keeper's keypair
pub struct SolanaProtocolWriter {
    client: Arc<RpcClient>,
    reader: Arc<SolanaChainReader>,
    addresses: ProtocolAddresses,
    keeper: Keypair,
    receipt_timeout: Duration,
}

impl SolanaProtocolWriter {
    pub fn new(
        client: Arc<RpcClient>,
        reader: Arc<SolanaChainReader>,
        addresses: ProtocolAddresses,
        keeper: Keypair,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            client,
            reader,
            addresses,
            keeper,
            receipt_timeout,
        }
    }

    async fn allocate_instruction(&self, call: &AllocateCall) -> Result<Instruction, ChainError> {
        let strategy = self.reader.strategy_account(&call.strategy).await?;
        let vault = self.reader.vault_account(&call.token).await?;
        let args = AllocateDepositArgs {
            amount: call.amount,
            fee: call.fee,
            swap_enabled: call.swap.enabled,
            min_amount_out: call.swap.min_amount_out,
        };

        Ok(Instruction {
            program_id: self.addresses.program_id,
            accounts: vec![
                AccountMeta::new(self.keeper.pubkey(), true),
                AccountMeta::new_readonly(self.addresses.router(), false),
                AccountMeta::new(self.addresses.vault(&call.token), false),
                AccountMeta::new(Pubkey::new_from_array(vault.token_account), false),
                AccountMeta::new_readonly(self.addresses.caps(&call.token), false),
                AccountMeta::new(call.strategy, false),
                AccountMeta::new(strategy.base_vault(), false),
                AccountMeta::new(strategy.quote_vault(), false),
                AccountMeta::new(self.addresses.position(&call.strategy, &call.depositor), false),
                AccountMeta::new_readonly(call.depositor, false),
                AccountMeta::new_readonly(call.token, false),
                AccountMeta::new_readonly(token_program(), false),
                AccountMeta::new_readonly(system_program::id(), false),
            ],
            data: instruction_data(AllocateDepositArgs::NAME, &args)?,
        })
    }

    async fn rebalance_instruction(&self, call: &RebalanceCall) -> Result<Instruction, ChainError> {
        let strategy = self.reader.strategy_account(&call.strategy).await?;
        let args = RebalancePositionArgs {
            fee: call.fee,
            referral: call.referral,
        };

        Ok(Instruction {
            program_id: self.addresses.program_id,
            accounts: vec![
                AccountMeta::new(self.keeper.pubkey(), true),
                AccountMeta::new_readonly(self.addresses.router(), false),
                AccountMeta::new(self.addresses.vault(&call.token), false),
                AccountMeta::new(call.strategy, false),
                AccountMeta::new(strategy.base_vault(), false),
                AccountMeta::new(strategy.quote_vault(), false),
                AccountMeta::new(self.addresses.position(&call.strategy, &call.user), false),
                AccountMeta::new_readonly(call.user, false),
                AccountMeta::new_readonly(call.token, false),
                AccountMeta::new_readonly(token_program(), false),
            ],
            data: instruction_data(RebalancePositionArgs::NAME, &args)?,
        })
    }

    /// Prefix the compute unit ceiling, sign, and hand to the node without
    /// waiting for confirmation
    async fn send(&self, instruction: Instruction, compute_units: u32) -> Result<Signature, ChainError> {
        let instructions = [ComputeBudgetInstruction::set_compute_unit_limit(compute_units), instruction];
        let recent_blockhash = self
            .client
            .get_latest_blockhash()
            .await
            .map_err(|e| ChainError::Rpc(format!("failed to get blockhash: {}", e)))?;

        let transaction = Transaction::new_signed_with_payer(
            &instructions,
            Some(&self.keeper.pubkey()),
            &[&self.keeper],
            recent_blockhash,
        );

        let signature = self
            .client
            .send_transaction(&transaction)
            .await
            .map_err(|e| ChainError::Send(e.to_string()))?;
        debug!(%signature, compute_units, "transaction sent");
        Ok(signature)
    }
}

#[async_trait]
impl ProtocolWriter for SolanaProtocolWriter {
    async fn send_allocate(&self, call: &AllocateCall) -> Result<Signature, ChainError> {
        let instruction = self.allocate_instruction(call).await?;
        self.send(instruction, call.compute_units).await
    }

    async fn send_rebalance(&self, call: &RebalanceCall) -> Result<Signature, ChainError> {
        let instruction = self.rebalance_instruction(call).await?;
        self.send(instruction, call.compute_units).await
    }

    async fn await_receipt(&self, signature: &Signature) -> Result<TxReceipt, ChainError> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            match self.client.get_signature_status(signature).await {
                Ok(Some(Ok(()))) => {
                    info!(%signature, "transaction confirmed");
                    return Ok(TxReceipt {
                        signature: *signature,
                        success: true,
                        error: None,
                    });
                }
                Ok(Some(Err(e))) => {
                    warn!(%signature, error = %e, "transaction failed on chain");
                    return Ok(TxReceipt {
                        signature: *signature,
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
                Ok(None) => {}
                Err(e) => debug!(%signature, error = %e, "signature status unavailable, retrying"),
            }

            if Instant::now() >= deadline {
                return Err(ChainError::ReceiptTimeout(self.receipt_timeout.as_secs()));
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

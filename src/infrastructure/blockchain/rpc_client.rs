//! RPC-backed reader for the vault program's accounts

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use borsh::BorshDeserialize;
use num_bigint::BigUint;
use num_traits::Zero;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::{Account as TokenAccount, Mint};
use tracing::debug;

use super::protocol_structures::{
    decode_account, ProtocolAddresses, RouterAccount, StrategyAccount, TokenCapsAccount, UserPositionAccount,
    VaultAccount, POSITION_MINT_OFFSET,
};
use crate::domain::chain::{ChainReader, PoolReserves, StrategyState, TokenCaps, VaultState};
use crate::shared::errors::ChainError;

pub fn connect(rpc_url: &str, timeout: Duration) -> Arc<RpcClient> {
    Arc::new(RpcClient::new_with_timeout_and_commitment(
        rpc_url.to_string(),
        timeout,
        CommitmentConfig::confirmed(),
    ))
}

fn rpc_error(e: impl std::fmt::Display) -> ChainError {
    ChainError::Rpc(e.to_string())
}

fn unpack_error(key: &Pubkey, e: impl std::fmt::Display) -> ChainError {
    ChainError::Decode {
        account: key.to_string(),
        reason: e.to_string(),
    }
}

/// Reads protocol state straight from account data
pub struct SolanaChainReader {
    client: Arc<RpcClient>,
    addresses: ProtocolAddresses,
}

impl SolanaChainReader {
    pub fn new(client: Arc<RpcClient>, addresses: ProtocolAddresses) -> Self {
        Self { client, addresses }
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
        let response = self
            .client
            .get_account_with_commitment(address, self.client.commitment())
            .await
            .map_err(rpc_error)?;
        Ok(response.value.map(|account| account.data))
    }

    async fn required<T: BorshDeserialize>(&self, name: &str, address: &Pubkey) -> Result<T, ChainError> {
        let data = self
            .account_data(address)
            .await?
            .ok_or_else(|| ChainError::AccountNotFound(format!("{} {}", name, address)))?;
        decode_account(name, &data)
    }

    pub async fn strategy_account(&self, strategy: &Pubkey) -> Result<StrategyAccount, ChainError> {
        self.required(StrategyAccount::NAME, strategy).await
    }

    pub async fn vault_account(&self, token: &Pubkey) -> Result<VaultAccount, ChainError> {
        self.required(VaultAccount::NAME, &self.addresses.vault(token)).await
    }
}

/// Output of a constant-product swap, before fees
pub fn constant_product_out(reserve_in: &BigUint, reserve_out: &BigUint, amount_in: &BigUint) -> BigUint {
    let denominator = reserve_in + amount_in;
    if denominator.is_zero() {
        return BigUint::zero();
    }
    reserve_out * amount_in / denominator
}

#[async_trait]
impl ChainReader for SolanaChainReader {
    async fn strategy_state(&self, strategy: &Pubkey) -> Result<StrategyState, ChainError> {
        let account = self.strategy_account(strategy).await?;
        Ok(StrategyState {
            is_active: account.is_active,
            underlying_mint: Pubkey::new_from_array(account.underlying_mint),
            base_mint: Pubkey::new_from_array(account.base_mint),
            quote_mint: Pubkey::new_from_array(account.quote_mint),
            tvl: BigUint::from(account.tvl),
            total_assets: BigUint::from(account.total_assets),
            total_shares: BigUint::from(account.total_shares),
        })
    }

    async fn user_shares(&self, strategy: &Pubkey, user: &Pubkey) -> Result<BigUint, ChainError> {
        let address = self.addresses.position(strategy, user);
        match self.account_data(&address).await? {
            Some(data) => {
                let position: UserPositionAccount = decode_account(UserPositionAccount::NAME, &data)?;
                Ok(BigUint::from(position.shares))
            }
            None => Ok(BigUint::zero()),
        }
    }

    async fn convert_to_assets(&self, strategy: &Pubkey, shares: &BigUint) -> Result<BigUint, ChainError> {
        let account = self.strategy_account(strategy).await?;
        if account.total_shares == 0 {
            return Ok(shares.clone());
        }
        Ok(shares * BigUint::from(account.total_assets) / BigUint::from(account.total_shares))
    }

    async fn vault_state(&self, token: &Pubkey) -> Result<VaultState, ChainError> {
        let vault = self.vault_account(token).await?;
        Ok(VaultState {
            paused: vault.paused,
            total_assets: BigUint::from(vault.total_assets),
            undistributed: BigUint::from(vault.undistributed),
        })
    }

    async fn token_caps(&self, token: &Pubkey) -> Result<TokenCaps, ChainError> {
        let caps: TokenCapsAccount = self.required(TokenCapsAccount::NAME, &self.addresses.caps(token)).await?;
        Ok(TokenCaps {
            max_percent_liquidity_bps: u32::from(caps.max_percent_liquidity_bps),
            max_deposit_value: BigUint::from(caps.max_deposit_value),
        })
    }

    async fn router_paused(&self) -> Result<bool, ChainError> {
        let router: RouterAccount = self.required(RouterAccount::NAME, &self.addresses.router()).await?;
        Ok(router.paused)
    }

    async fn pool_reserves(&self, strategy: &Pubkey) -> Result<PoolReserves, ChainError> {
        let account = self.strategy_account(strategy).await?;
        let base_mint = Pubkey::new_from_array(account.base_mint);
        let quote_mint = Pubkey::new_from_array(account.quote_mint);
        let keys = [account.base_vault(), account.quote_vault(), base_mint, quote_mint];

        let accounts = self.client.get_multiple_accounts(&keys).await.map_err(rpc_error)?;
        let mut data = Vec::with_capacity(keys.len());
        for (key, account) in keys.iter().zip(accounts) {
            let account = account.ok_or_else(|| ChainError::AccountNotFound(key.to_string()))?;
            data.push(account.data);
        }

        let base_vault = TokenAccount::unpack(&data[0]).map_err(|e| unpack_error(&keys[0], e))?;
        let quote_vault = TokenAccount::unpack(&data[1]).map_err(|e| unpack_error(&keys[1], e))?;
        let base = Mint::unpack(&data[2]).map_err(|e| unpack_error(&keys[2], e))?;
        let quote = Mint::unpack(&data[3]).map_err(|e| unpack_error(&keys[3], e))?;

        debug!(
            strategy = %strategy,
            base_reserve = base_vault.amount,
            quote_reserve = quote_vault.amount,
            "pool reserves read"
        );
        Ok(PoolReserves {
            base_mint,
            quote_mint,
            base_reserve: BigUint::from(base_vault.amount),
            quote_reserve: BigUint::from(quote_vault.amount),
            base_decimals: base.decimals,
            quote_decimals: quote.decimals,
        })
    }

    async fn quote_amount_out(
        &self,
        strategy: &Pubkey,
        token_in: &Pubkey,
        amount_in: &BigUint,
    ) -> Result<BigUint, ChainError> {
        let reserves = self.pool_reserves(strategy).await?;
        let (reserve_in, reserve_out) = if *token_in == reserves.base_mint {
            (&reserves.base_reserve, &reserves.quote_reserve)
        } else if *token_in == reserves.quote_mint {
            (&reserves.quote_reserve, &reserves.base_reserve)
        } else {
            return Err(ChainError::InvalidData(format!(
                "{} is not traded by strategy {}",
                token_in, strategy
            )));
        };
        Ok(constant_product_out(reserve_in, reserve_out, amount_in))
    }

    async fn position_holders(&self, token: &Pubkey) -> Result<Vec<Pubkey>, ChainError> {
        let filters = vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(
            POSITION_MINT_OFFSET,
            token.as_ref(),
        ))];
        let config = RpcProgramAccountsConfig {
            filters: Some(filters),
            account_config: RpcAccountInfoConfig {
                encoding: Some(solana_account_decoder::UiAccountEncoding::Base64),
                data_slice: None,
                commitment: Some(self.client.commitment()),
                min_context_slot: None,
            },
            with_context: None,
            sort_results: None,
        };

        let accounts = self
            .client
            .get_program_accounts_with_config(&self.addresses.program_id, config)
            .await
            .map_err(rpc_error)?;

        let mut holders = Vec::new();
        for (address, account) in accounts {
            let position: UserPositionAccount = match decode_account(UserPositionAccount::NAME, &account.data) {
                Ok(position) => position,
                Err(e) => {
                    debug!(account = %address, error = %e, "skipping non-position account");
                    continue;
                }
            };
            let user = Pubkey::new_from_array(position.user);
            if position.shares > 0 && !holders.contains(&user) {
                holders.push(user);
            }
        }
        Ok(holders)
    }
}

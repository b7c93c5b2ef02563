//! Vault program account, instruction and event layouts

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::hash::hash;
use solana_sdk::pubkey::Pubkey;

use crate::shared::errors::ChainError;
use crate::shared::types::DepositEvent;

pub const DISCRIMINATOR_LEN: usize = 8;

/// Offset of `mint` inside a `UserPosition` account, discriminator included
pub const POSITION_MINT_OFFSET: usize = DISCRIMINATOR_LEN + 32 + 32;

fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let digest = hash(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest.to_bytes()[..DISCRIMINATOR_LEN]);
    out
}

pub fn account_discriminator(name: &str) -> [u8; 8] {
    discriminator("account", name)
}

pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    discriminator("global", name)
}

pub fn event_discriminator(name: &str) -> [u8; 8] {
    discriminator("event", name)
}

/// Check the discriminator of `name` and decode the rest of `data`
pub fn decode_account<T: BorshDeserialize>(name: &str, data: &[u8]) -> Result<T, ChainError> {
    if data.len() < DISCRIMINATOR_LEN {
        return Err(ChainError::Decode {
            account: name.to_string(),
            reason: format!("{} bytes is shorter than the discriminator", data.len()),
        });
    }
    if data[..DISCRIMINATOR_LEN] != account_discriminator(name) {
        return Err(ChainError::Decode {
            account: name.to_string(),
            reason: "discriminator mismatch".to_string(),
        });
    }
    let mut body = &data[DISCRIMINATOR_LEN..];
    T::deserialize(&mut body).map_err(|e| ChainError::Decode {
        account: name.to_string(),
        reason: e.to_string(),
    })
}

#[derive(BorshDeserialize, BorshSerialize, Debug, Clone)]
pub struct StrategyAccount {
    pub is_active: bool,
    pub underlying_mint: [u8; 32],
    pub base_mint: [u8; 32],
    pub quote_mint: [u8; 32],
    pub base_vault: [u8; 32],
    pub quote_vault: [u8; 32],
    pub tvl: u64,
    pub total_assets: u64,
    pub total_shares: u64,
    pub bump: u8,
}

impl StrategyAccount {
    pub const NAME: &'static str = "Strategy";

    pub fn base_vault(&self) -> Pubkey {
        Pubkey::new_from_array(self.base_vault)
    }

    pub fn quote_vault(&self) -> Pubkey {
        Pubkey::new_from_array(self.quote_vault)
    }
}

#[derive(BorshDeserialize, BorshSerialize, Debug, Clone)]
pub struct UserPositionAccount {
    pub strategy: [u8; 32],
    pub user: [u8; 32],
    pub mint: [u8; 32],
    pub shares: u64,
    pub bump: u8,
}

impl UserPositionAccount {
    pub const NAME: &'static str = "UserPosition";
}

#[derive(BorshDeserialize, BorshSerialize, Debug, Clone)]
pub struct VaultAccount {
    pub mint: [u8; 32],
    /// Token account holding undistributed deposits
    pub token_account: [u8; 32],
    pub paused: bool,
    pub total_assets: u64,
    pub undistributed: u64,
    pub bump: u8,
}

impl VaultAccount {
    pub const NAME: &'static str = "Vault";
}

#[derive(BorshDeserialize, BorshSerialize, Debug, Clone)]
pub struct TokenCapsAccount {
    pub mint: [u8; 32],
    pub max_percent_liquidity_bps: u16,
    pub max_deposit_value: u64,
    pub bump: u8,
}

impl TokenCapsAccount {
    pub const NAME: &'static str = "TokenCaps";
}

#[derive(BorshDeserialize, BorshSerialize, Debug, Clone)]
pub struct RouterAccount {
    pub authority: [u8; 32],
    pub paused: bool,
    pub bump: u8,
}

impl RouterAccount {
    pub const NAME: &'static str = "Router";
}

/// `allocate_deposit` arguments
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct AllocateDepositArgs {
    pub amount: u64,
    pub fee: u64,
    pub swap_enabled: bool,
    pub min_amount_out: u64,
}

impl AllocateDepositArgs {
    pub const NAME: &'static str = "allocate_deposit";
}

/// `rebalance_position` arguments
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct RebalancePositionArgs {
    pub fee: u64,
    pub referral: bool,
}

impl RebalancePositionArgs {
    pub const NAME: &'static str = "rebalance_position";
}

/// Discriminator followed by the borsh-encoded arguments
pub fn instruction_data<T: BorshSerialize>(name: &str, args: &T) -> Result<Vec<u8>, ChainError> {
    let mut data = instruction_discriminator(name).to_vec();
    args.serialize(&mut data)
        .map_err(|e| ChainError::InvalidData(format!("failed to encode {} args: {}", name, e)))?;
    Ok(data)
}

#[derive(BorshDeserialize, BorshSerialize, Debug, Clone)]
pub struct DepositEventData {
    pub token: [u8; 32],
    pub receiver: [u8; 32],
    pub amount: u64,
    pub actual_amount: u64,
    pub timestamp: i64,
}

impl DepositEventData {
    pub const NAME: &'static str = "DepositEvent";

    /// Decode a raw event payload; `None` for any other event
    pub fn try_decode(payload: &[u8]) -> Option<DepositEvent> {
        if payload.len() < DISCRIMINATOR_LEN || payload[..DISCRIMINATOR_LEN] != event_discriminator(Self::NAME) {
            return None;
        }
        let mut body = &payload[DISCRIMINATOR_LEN..];
        let data = Self::deserialize(&mut body).ok()?;
        Some(DepositEvent {
            token: Pubkey::new_from_array(data.token),
            receiver: Pubkey::new_from_array(data.receiver),
            amount: data.amount,
            actual_amount: data.actual_amount,
            timestamp: data.timestamp,
        })
    }
}

/// PDA derivation for the vault program
#[derive(Debug, Clone, Copy)]
pub struct ProtocolAddresses {
    pub program_id: Pubkey,
}

impl ProtocolAddresses {
    pub fn new(program_id: Pubkey) -> Self {
        Self { program_id }
    }

    pub fn position(&self, strategy: &Pubkey, user: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"position", strategy.as_ref(), user.as_ref()], &self.program_id).0
    }

    pub fn vault(&self, mint: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"vault", mint.as_ref()], &self.program_id).0
    }

    pub fn caps(&self, mint: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(&[b"caps", mint.as_ref()], &self.program_id).0
    }

    pub fn router(&self) -> Pubkey {
        Pubkey::find_program_address(&[b"router"], &self.program_id).0
    }
}

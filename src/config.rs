use anyhow::{Context, Result};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::{fs, path::Path, str::FromStr};

use vaultkeeper::application::RebalanceConfig;
use vaultkeeper::domain::allocation::{AllocationPolicy, ScoringWeights};
use vaultkeeper::domain::execution::ExecutionConfig;
use vaultkeeper::domain::pool::PoolConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcCfg {
    pub url: String,
    /// Websocket endpoint for log subscriptions; derived from `url` when absent
    pub ws_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RpcCfg {
    pub fn ws_url(&self) -> String {
        match &self.ws_url {
            Some(url) => url.clone(),
            None => self.url.replacen("https://", "wss://", 1).replacen("http://", "ws://", 1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletCfg {
    pub keypair: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolCfg {
    pub program_id: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: String,
    pub supported_tokens: Vec<String>,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AllocationCfg {
    pub weights: ScoringWeights,
    pub policy: AllocationPolicy,
    pub max_concurrent_reads: usize,
}

impl Default for AllocationCfg {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            policy: AllocationPolicy::default(),
            max_concurrent_reads: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogCfg {
    pub path: String,
}

impl Default for LogCfg {
    fn default() -> Self {
        Self {
            path: "transactions.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc: RpcCfg,
    pub wallet: WalletCfg,
    pub protocol: ProtocolCfg,
    #[serde(default)]
    pub allocation: AllocationCfg,
    #[serde(default)]
    pub rebalance: RebalanceConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub log: LogCfg,
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_chain_id() -> String {
    "mainnet-beta".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())
            .with_context(|| format!("read config {}", path.as_ref().display()))?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).context("parse Config.toml")?;
        cfg.program_id()?;
        cfg.supported_tokens()?;
        cfg.rebalance.validate().context("invalid [rebalance] section")?;
        Ok(cfg)
    }

    pub fn program_id(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.protocol.program_id)
            .with_context(|| format!("invalid program id {}", self.protocol.program_id))
    }

    pub fn supported_tokens(&self) -> Result<Vec<Pubkey>> {
        self.protocol
            .supported_tokens
            .iter()
            .map(|mint| Pubkey::from_str(mint).with_context(|| format!("invalid supported token {}", mint)))
            .collect()
    }
}

// src/app.rs
use anyhow::{Context, Result};
use serde::Serialize;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{read_keypair_file, Signer},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use vaultkeeper::application::{
    run_deposit_loop, run_rebalance_schedule, DepositAllocator, PriceDriftRebalancer, RebalanceConfig, TickOutcome,
};
use vaultkeeper::domain::allocation::{score_pools, AllocationPolicy, ScoringWeights};
use vaultkeeper::domain::execution::{ExecutionConfig, MemoryTransactionLog, TransactionLog, TransactionSubmitter};
use vaultkeeper::domain::pool::{PoolConfig, PoolRegistry, StateAggregator, StaticPoolRegistry};
use vaultkeeper::infrastructure::blockchain::{
    connect, DepositEventListener, ProtocolAddresses, SolanaChainReader, SolanaProtocolWriter,
};
use vaultkeeper::infrastructure::storage::JsonlTransactionLog;
use vaultkeeper::shared::utils::format_amount;

use crate::config::Config;

const DEPOSIT_CHANNEL_CAPACITY: usize = 256;

/// CLI values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub rpc_url: Option<String>,
    pub keypair: Option<String>,
    pub log_path: Option<String>,
    pub dry_log: bool,
}

#[derive(Debug, Clone)]
pub struct AppCfg {
    pub rpc_url: String,
    pub ws_url: String,
    pub rpc_timeout: Duration,
    pub keypair_path: String,
    pub program_id: Pubkey,
    pub chain_id: String,
    pub supported_tokens: Vec<Pubkey>,
    pub reconnect_delay: Duration,
    pub weights: ScoringWeights,
    pub policy: AllocationPolicy,
    pub max_concurrent_reads: usize,
    pub rebalance: RebalanceConfig,
    pub execution: ExecutionConfig,
    /// `None` keeps the transaction log in memory
    pub log_path: Option<String>,
    pub pools: Vec<PoolConfig>,
}

impl AppCfg {
    pub fn from_config(cfg: Config, overrides: Overrides) -> Result<Self> {
        let program_id = cfg.program_id()?;
        let supported_tokens = cfg.supported_tokens()?;

        let mut rpc = cfg.rpc.clone();
        if let Some(rpc_url) = overrides.rpc_url {
            // an explicit ws endpoint in the file belongs to the old url
            rpc.url = rpc_url;
            rpc.ws_url = None;
        }
        let log_path = if overrides.dry_log {
            None
        } else {
            Some(overrides.log_path.unwrap_or(cfg.log.path))
        };

        Ok(Self {
            ws_url: rpc.ws_url(),
            rpc_url: rpc.url,
            rpc_timeout: Duration::from_secs(rpc.timeout_secs),
            keypair_path: overrides.keypair.unwrap_or(cfg.wallet.keypair),
            program_id,
            chain_id: cfg.protocol.chain_id,
            supported_tokens,
            reconnect_delay: Duration::from_secs(cfg.protocol.reconnect_delay_secs),
            weights: cfg.allocation.weights,
            policy: cfg.allocation.policy,
            max_concurrent_reads: cfg.allocation.max_concurrent_reads,
            rebalance: cfg.rebalance,
            execution: cfg.execution,
            log_path,
            pools: cfg.pools,
        })
    }
}

/// Shared handles every entry point needs
struct Keeper {
    reader: Arc<SolanaChainReader>,
    registry: Arc<StaticPoolRegistry>,
    submitter: Arc<TransactionSubmitter>,
    log: Arc<dyn TransactionLog>,
}

fn reader(app_cfg: &AppCfg) -> (Arc<RpcClient>, Arc<SolanaChainReader>) {
    let client = connect(&app_cfg.rpc_url, app_cfg.rpc_timeout);
    let reader = Arc::new(SolanaChainReader::new(
        client.clone(),
        ProtocolAddresses::new(app_cfg.program_id),
    ));
    (client, reader)
}

fn registry(app_cfg: &AppCfg) -> Result<Arc<StaticPoolRegistry>> {
    let registry = StaticPoolRegistry::new(app_cfg.pools.clone()).context("load pool registry")?;
    info!(pools = registry.len(), "pool registry loaded");
    Ok(Arc::new(registry))
}

impl Keeper {
    async fn build(app_cfg: &AppCfg) -> Result<Self> {
        let (client, reader) = reader(app_cfg);
        let registry = registry(app_cfg)?;

        let keypair = read_keypair_file(&app_cfg.keypair_path)
            .map_err(|e| anyhow::anyhow!("Failed to load keypair {}: {}", app_cfg.keypair_path, e))?;
        info!(keeper = %keypair.pubkey(), "loaded keypair");

        let writer = Arc::new(SolanaProtocolWriter::new(
            client,
            reader.clone(),
            ProtocolAddresses::new(app_cfg.program_id),
            keypair,
            Duration::from_secs(app_cfg.execution.receipt_timeout_secs),
        ));
        let submitter = Arc::new(TransactionSubmitter::new(
            writer,
            reader.clone(),
            app_cfg.execution.clone(),
        ));

        let log: Arc<dyn TransactionLog> = match &app_cfg.log_path {
            Some(path) => {
                let log = JsonlTransactionLog::open(path)
                    .await
                    .with_context(|| format!("open transaction log {}", path))?;
                info!(path = %log.path().display(), "transaction log opened");
                Arc::new(log)
            }
            None => {
                warn!("transaction log kept in memory only");
                Arc::new(MemoryTransactionLog::new())
            }
        };

        Ok(Self {
            reader,
            registry,
            submitter,
            log,
        })
    }

    fn rebalancer(&self, app_cfg: &AppCfg) -> PriceDriftRebalancer {
        PriceDriftRebalancer::new(
            app_cfg.chain_id.clone(),
            app_cfg.supported_tokens.clone(),
            self.registry.clone(),
            self.reader.clone(),
            self.submitter.clone(),
            self.log.clone(),
            app_cfg.rebalance.drop_threshold,
        )
    }
}

/// Long-running keeper: deposit events and the rebalance schedule
pub async fn run(app_cfg: AppCfg) -> Result<()> {
    info!(
        rpc = %app_cfg.rpc_url,
        program = %app_cfg.program_id,
        chain = %app_cfg.chain_id,
        tokens = app_cfg.supported_tokens.len(),
        "starting vault keeper"
    );
    let keeper = Keeper::build(&app_cfg).await?;

    let allocator = Arc::new(DepositAllocator::new(
        app_cfg.chain_id.clone(),
        app_cfg.supported_tokens.clone(),
        keeper.registry.clone(),
        keeper.reader.clone(),
        keeper.submitter.clone(),
        keeper.log.clone(),
        app_cfg.weights,
        app_cfg.policy,
        app_cfg.max_concurrent_reads,
    ));
    let rebalancer = Arc::new(keeper.rebalancer(&app_cfg));

    let (sender, receiver) = mpsc::channel(DEPOSIT_CHANNEL_CAPACITY);
    let listener = DepositEventListener::new(app_cfg.ws_url.clone(), app_cfg.program_id, app_cfg.reconnect_delay);

    let mut listener_task = tokio::spawn(listener.run(sender));
    let mut deposit_task = tokio::spawn(run_deposit_loop(allocator, receiver));
    let mut schedule_task = tokio::spawn(run_rebalance_schedule(
        rebalancer,
        Duration::from_secs(app_cfg.rebalance.interval_secs),
    ));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listen for shutdown signal")?;
            info!("shutdown requested");
        }
        result = &mut listener_task => error!(?result, "deposit listener exited"),
        result = &mut deposit_task => error!(?result, "deposit loop exited"),
        result = &mut schedule_task => error!(?result, "rebalance schedule exited"),
    }

    listener_task.abort();
    deposit_task.abort();
    schedule_task.abort();
    info!("vault keeper stopped");
    Ok(())
}

/// Run a single rebalance tick and exit
pub async fn rebalance_once(app_cfg: AppCfg) -> Result<()> {
    let keeper = Keeper::build(&app_cfg).await?;
    let rebalancer = keeper.rebalancer(&app_cfg);

    match rebalancer.run_tick().await {
        TickOutcome::Completed(report) => {
            for (pool, observation) in &report.observations {
                info!(pool = %pool, price = observation.current, "price observed");
            }
            for (pool, e) in &report.skipped {
                warn!(pool = %pool, error = %e, "pool skipped");
            }
            for (target, e) in report.rebalances.failures() {
                warn!(target, error = %e, "rebalance failed");
            }
            info!(
                attempted = report.rebalances.len(),
                succeeded = report.rebalances.succeeded(),
                "rebalance tick done"
            );
        }
        TickOutcome::Paused(reason) => warn!(%reason, "protocol paused, nothing done"),
        TickOutcome::RegistryUnavailable(reason) => anyhow::bail!("pool registry unavailable: {}", reason),
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct RankedPool {
    rank: usize,
    name: String,
    strategy: String,
    tvl: String,
    liquidity_room: String,
    composite_score: f64,
}

#[derive(Debug, Serialize)]
struct TokenRanking {
    token: String,
    ranked: Vec<RankedPool>,
    rejected: Vec<(String, String)>,
}

/// Aggregate and rank every registered pool without sending anything
pub async fn show_pools(app_cfg: AppCfg) -> Result<()> {
    let (_, reader) = reader(&app_cfg);
    let registry = registry(&app_cfg)?;
    let aggregator = StateAggregator::new(reader, app_cfg.max_concurrent_reads);
    let candidates = registry
        .pools_for_chain(&app_cfg.chain_id)
        .await
        .context("list registered pools")?;

    let mut rankings = Vec::new();
    for token in &app_cfg.supported_tokens {
        let report = aggregator.aggregate(token, &candidates, None).await;
        let ranked = score_pools(report.snapshots, &app_cfg.weights)
            .into_iter()
            .enumerate()
            .map(|(i, scored)| RankedPool {
                rank: i + 1,
                tvl: format_amount(&scored.snapshot.tvl, scored.snapshot.base_decimals),
                liquidity_room: format_amount(&scored.snapshot.liquidity_room, scored.snapshot.base_decimals),
                name: scored.snapshot.pool.name,
                strategy: scored.snapshot.pool.strategy.to_string(),
                composite_score: scored.composite,
            })
            .collect();
        rankings.push(TokenRanking {
            token: token.to_string(),
            ranked,
            rejected: report
                .rejected
                .into_iter()
                .map(|(pool, e)| (pool, e.to_string()))
                .collect(),
        });
    }

    println!("{}", serde_json::to_string_pretty(&rankings)?);
    Ok(())
}

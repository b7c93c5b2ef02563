mod app;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Vault keeper: allocates deposits and rebalances positions on price drift")]
struct Args {
    /// Path to config file
    #[arg(long, default_value = "Config.toml")]
    config: String,

    /// RPC endpoint URL (overrides config)
    #[arg(long)]
    rpc_url: Option<String>,

    /// Path to keypair file (overrides config)
    #[arg(long)]
    keypair: Option<String>,

    /// Transaction log file (overrides config)
    #[arg(long)]
    log_path: Option<String>,

    /// Keep the transaction log in memory instead of writing it to disk
    #[arg(long)]
    dry_log: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Listen for deposits and rebalance on schedule until interrupted
    Run,
    /// Run one rebalance tick and exit
    RebalanceOnce,
    /// Aggregate and rank the registered pools without sending anything
    Pools,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    // priority: CLI args > config file > defaults
    let cfg = config::Config::from_file(&args.config)?;
    let app_cfg = app::AppCfg::from_config(
        cfg,
        app::Overrides {
            rpc_url: args.rpc_url,
            keypair: args.keypair,
            log_path: args.log_path,
            dry_log: args.dry_log,
        },
    )?;

    match args.command {
        Command::Run => app::run(app_cfg).await,
        Command::RebalanceOnce => app::rebalance_once(app_cfg).await,
        Command::Pools => app::show_pools(app_cfg).await,
    }
}

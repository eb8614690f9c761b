//! Multisig wallet command line.
//!
//! ```text
//! multisig-wallet [--config wallet.toml] generate-account
//! multisig-wallet [--config wallet.toml] gas-price
//! multisig-wallet [--config wallet.toml] balance <address>
//! multisig-wallet [--config wallet.toml] sync
//! ```

use std::path::PathBuf;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};

use multisig_wallet::config::{load_config, WalletConfig};
use multisig_wallet::crypto::KeyService;
use multisig_wallet::lifecycle::{signals, Shutdown, WalletCore};
use multisig_wallet::node::{EthereumNode, RpcNodeClient};
use multisig_wallet::observability::{logging, metrics};
use multisig_wallet::relay::{HttpRelayClient, TransactionRelay};

#[derive(Parser)]
#[command(name = "multisig-wallet")]
#[command(about = "Multisig wallet core tools", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new owner key and print its recovery phrase
    GenerateAccount,
    /// Show the relay's current gas prices
    GasPrice,
    /// Show the ether balance of an address
    Balance { address: Address },
    /// Run background synchronisation until Ctrl-C
    Sync,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => WalletConfig::default(),
    };

    logging::init_logging(&config.observability);
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match cli.command {
        Commands::GenerateAccount => {
            let keys = KeyService::new(Some(config.node.chain_id));
            let account = keys.generate_account()?;
            println!("address:  {}", account.address());
            if let Some(words) = account.mnemonic_words() {
                println!("mnemonic: {}", words.join(" "));
            }
        }
        Commands::GasPrice => {
            let relay = HttpRelayClient::new(&config.relay)?;
            let prices = relay.gas_price().await?;
            println!("safeLow:  {}", prices.safe_low);
            println!("standard: {}", prices.standard);
            println!("fast:     {}", prices.fast);
            println!("fastest:  {}", prices.fastest);
        }
        Commands::Balance { address } => {
            let node = RpcNodeClient::new(&config.node)?;
            let balance = node.get_balance(address).await?;
            println!("{} wei", balance);
        }
        Commands::Sync => run_sync(&config).await?,
    }

    Ok(())
}

async fn run_sync(config: &WalletConfig) -> Result<(), Box<dyn std::error::Error>> {
    let core = WalletCore::from_config(config)?;
    let shutdown = Shutdown::new();

    core.sync.sync_transactions();
    tokio::select! {
        result = core.sync.sync() => match result {
            Ok(()) => tracing::info!(accounts = core.balances.len(), "Initial sync complete"),
            Err(e) => tracing::warn!(error = %e, "Initial sync did not finish"),
        },
        _ = signals::wait_for_signal(&shutdown) => {}
    }

    if !shutdown.is_triggered() {
        signals::wait_for_signal(&shutdown).await;
    }
    core.sync.stop();
    tracing::info!("Shutdown complete");
    Ok(())
}

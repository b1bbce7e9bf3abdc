//! CLI definitions and command implementations for the wallet provider.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use wallet_provider::chain::{Chain, ChainId, RelayChain};
use wallet_provider::config::load_config;
use wallet_provider::provider::{LocalWalletProvider, WalletProvider, build_wallet_provider};
use wallet_provider::telemetry::{Telemetry, TelemetryGuard};

pub mod accounts;
pub mod chains;
pub mod connect;
pub mod init;
pub mod sign;

/// Wallet provider: chains, accounts and signing for Substrate-based dapps.
#[derive(Debug, Parser)]
#[command(name = "wallet-provider")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a default TOML configuration file.
    Init {
        /// Output path for the configuration file.
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite the file if it already exists.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// List relay chains and their parachains as JSON.
    Chains {
        /// Path to the TOML configuration file.
        #[arg(short, long, env = "CONFIG", default_value = "config.toml")]
        config: PathBuf,
    },

    /// List accounts as JSON, with addresses for the given chain.
    Accounts {
        /// Path to the TOML configuration file.
        #[arg(short, long, env = "CONFIG", default_value = "config.toml")]
        config: PathBuf,

        /// Chain whose SS58 format renders the addresses (generic format if omitted).
        #[arg(long)]
        chain: Option<ChainId>,
    },

    /// Sign a JSON payload file on behalf of an origin.
    Sign {
        /// Path to the TOML configuration file.
        #[arg(short, long, env = "CONFIG", default_value = "config.toml")]
        config: PathBuf,

        /// SS58 address of the signing account.
        #[arg(long)]
        account: String,

        /// Origin requesting the signature.
        #[arg(long)]
        origin: String,

        /// Path to the JSON sign payload.
        #[arg(long)]
        payload: PathBuf,
    },

    /// Open a JSON-RPC session: requests on stdin, responses on stdout.
    Connect {
        /// Path to the TOML configuration file.
        #[arg(short, long, env = "CONFIG", default_value = "config.toml")]
        config: PathBuf,

        /// Chain to connect to.
        #[arg(long)]
        chain: ChainId,

        /// Milliseconds to keep receiving after stdin closes.
        #[arg(long, default_value_t = 1000)]
        linger: u64,
    },
}

/// Loads `.env` and the config, installs logging, and builds the provider.
///
/// The returned guard must be kept alive for the duration of the command.
pub(crate) async fn load_provider(
    config_path: &Path,
) -> Result<(LocalWalletProvider, TelemetryGuard), Box<dyn std::error::Error>> {
    dotenv().ok();

    let config = load_config(config_path)?;
    let mut telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"));
    if let Some(level) = &config.log_level {
        telemetry = telemetry.with_log_level(level.clone());
    }
    let guard = telemetry.register();

    let provider = build_wallet_provider(&config).await?;
    Ok((provider, guard))
}

/// Finds a relay chain or parachain by identity.
pub(crate) async fn find_chain(
    provider: &LocalWalletProvider,
    chain_id: &ChainId,
) -> Result<Arc<dyn Chain>, Box<dyn std::error::Error>> {
    for (relay_id, relay) in provider.get_chains().await? {
        if &relay_id == chain_id {
            return Ok(relay);
        }
        if let Some(parachain) = relay.get_chains().await?.remove(chain_id) {
            return Ok(parachain);
        }
    }
    Err(format!("chain {chain_id} is not configured").into())
}

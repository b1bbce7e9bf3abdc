//! `wallet-provider chains` command: list relay chains and parachains.

use std::path::Path;

use serde::Serialize;
use wallet_provider::chain::{Chain, ChainInfo, RelayChain};
use wallet_provider::provider::{LocalWalletProvider, WalletProvider};
use wallet_provider::Result;

/// A relay chain with the parachains registered on it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayChainListing {
    #[serde(flatten)]
    info: ChainInfo,
    parachains: Vec<ChainInfo>,
}

/// Snapshot of every chain known to `provider`.
///
/// # Errors
///
/// Returns an error if the provider or a relay chain cannot enumerate.
pub async fn list(provider: &LocalWalletProvider) -> Result<Vec<RelayChainListing>> {
    let mut listing = Vec::new();
    for relay in provider.get_chains().await?.into_values() {
        let parachains = relay
            .get_chains()
            .await?
            .into_values()
            .map(|chain| chain.info().clone())
            .collect();
        listing.push(RelayChainListing {
            info: relay.info().clone(),
            parachains,
        });
    }
    Ok(listing)
}

/// Execute the `chains` command.
///
/// # Errors
///
/// Returns an error if the provider cannot be built or enumerated.
#[allow(clippy::print_stdout)]
pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (provider, _guard) = super::load_provider(config_path).await?;
    let listing = list(&provider).await?;
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

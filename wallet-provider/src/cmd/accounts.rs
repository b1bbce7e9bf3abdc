//! `wallet-provider accounts` command: list keyring accounts.

use std::path::Path;

use wallet_provider::account::AccountRegistry;
use wallet_provider::chain::{Chain, ChainId};
use wallet_provider::keyring::ChainAccounts;
use wallet_provider::ss58;

/// Execute the `accounts` command.
///
/// Addresses use the SS58 format of `chain`, or the generic format when no
/// chain is given.
///
/// # Errors
///
/// Returns an error if the provider cannot be built or `chain` is unknown.
#[allow(clippy::print_stdout)]
pub async fn run(
    config_path: &Path,
    chain: Option<&ChainId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (provider, _guard) = super::load_provider(config_path).await?;

    let accounts = match chain {
        Some(chain_id) => {
            super::find_chain(&provider, chain_id)
                .await?
                .accounts()
                .get_accounts()
                .await?
        }
        None => {
            ChainAccounts::new(provider.keyring().clone(), ss58::GENERIC_FORMAT)
                .get_accounts()
                .await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&accounts)?);
    Ok(())
}

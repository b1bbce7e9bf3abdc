//! Wallet provider: the root capability a dapp obtains.
//!
//! [`LocalWalletProvider`] is built from [`Config`] by
//! [`build_wallet_provider`]: keyring first, then every relay chain, then the
//! parachain specs each relay chain lists.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::chain::{Chain, ChainId, RelayChain, SubstrateRelayChain};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::keyring::Keyring;
use crate::signers::build_keyring;

/// Root capability exposing relay chains.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Relay chains known to the provider. Each call returns a fresh
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Rejects with [`Error::NotInitialized`] before the provider has been
    /// given its chains.
    async fn get_chains(&self) -> Result<BTreeMap<ChainId, Arc<dyn RelayChain>>>;
}

/// In-process wallet provider.
#[derive(Debug, Default)]
pub struct LocalWalletProvider {
    keyring: Keyring,
    relay_chains: RwLock<Option<BTreeMap<ChainId, Arc<dyn RelayChain>>>>,
}

impl LocalWalletProvider {
    /// Creates an uninitialised provider around `keyring`.
    #[must_use]
    pub fn new(keyring: Keyring) -> Self {
        Self {
            keyring,
            relay_chains: RwLock::new(None),
        }
    }

    /// Keyring shared by every chain of this provider.
    #[must_use]
    pub const fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Installs the relay chains, initialising the provider.
    pub fn install(&self, relay_chains: impl IntoIterator<Item = Arc<dyn RelayChain>>) {
        let relay_chains: BTreeMap<_, _> = relay_chains
            .into_iter()
            .map(|chain| (chain.chain_id().clone(), chain))
            .collect();
        tracing::info!(relay_chains = relay_chains.len(), "wallet provider initialised");
        *self
            .relay_chains
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(relay_chains);
    }

    /// Whether [`LocalWalletProvider::install`] has been called.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.relay_chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[async_trait]
impl WalletProvider for LocalWalletProvider {
    async fn get_chains(&self) -> Result<BTreeMap<ChainId, Arc<dyn RelayChain>>> {
        self.relay_chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::NotInitialized)
    }
}

/// Build a [`LocalWalletProvider`] from a [`Config`].
///
/// Parachain spec paths are resolved relative to the current directory.
///
/// # Errors
///
/// Returns an error if an account seed cannot be resolved, a relay chain has
/// invalid endpoints, or a parachain spec cannot be read or is rejected.
pub async fn build_wallet_provider(config: &Config) -> Result<LocalWalletProvider> {
    let keyring = build_keyring(&config.accounts)?;
    let provider = LocalWalletProvider::new(keyring);

    let mut relay_chains: Vec<Arc<dyn RelayChain>> = Vec::with_capacity(config.chains.len());
    for chain_config in config.chains.iter() {
        let relay = SubstrateRelayChain::from_endpoints(
            chain_config.info(),
            chain_config.inner.id.clone(),
            provider.keyring(),
            &chain_config.inner.rpc,
        )
        .map_err(|e| Error::chain(format!("relay chain {}: {e}", chain_config.chain_id)))?;

        for path in &chain_config.inner.parachains {
            let chainspec = tokio::fs::read_to_string(path).await.map_err(|e| {
                Error::config_with(format!("failed to read chain spec '{}'", path.display()), e)
            })?;
            relay.add_chain(&chainspec).await.map_err(|e| {
                Error::config(format!("chain spec '{}' rejected: {e}", path.display()))
            })?;
        }
        relay_chains.push(Arc::new(relay));
    }

    provider.install(relay_chains);
    Ok(provider)
}

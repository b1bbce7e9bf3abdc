//! Reference chain implementations.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use super::spec::ChainSpec;
use super::{Chain, ChainId, ChainInfo, RelayChain};
use crate::account::AccountRegistry;
use crate::error::{Error, Result};
use crate::keyring::{ChainAccounts, Keyring};
use crate::transport::memory::{MemoryConnector, StaticNode};
use crate::transport::ws::WsConnector;
use crate::transport::{Callback, Connector, JsonRpcConnection};

/// Connector for `info`: WebSocket when endpoints are given, otherwise an
/// in-process [`StaticNode`].
///
/// # Errors
///
/// Returns an error if an endpoint is not a valid WebSocket URL.
pub fn connector_for(info: &ChainInfo, endpoints: &[String]) -> Result<Arc<dyn Connector>> {
    if endpoints.is_empty() {
        Ok(Arc::new(MemoryConnector::new(Arc::new(StaticNode::new(
            info.clone(),
        )))))
    } else {
        Ok(Arc::new(WsConnector::new(endpoints)?))
    }
}

/// A chain reached through a [`Connector`], with accounts from a [`Keyring`].
#[derive(Debug)]
pub struct SubstrateChain {
    info: ChainInfo,
    accounts: ChainAccounts,
    connector: Arc<dyn Connector>,
}

impl SubstrateChain {
    /// Creates a chain handle.
    #[must_use]
    pub fn new(info: ChainInfo, keyring: &Keyring, connector: Arc<dyn Connector>) -> Self {
        let accounts = ChainAccounts::new(keyring.clone(), info.ss58_format);
        Self {
            info,
            accounts,
            connector,
        }
    }
}

impl Chain for SubstrateChain {
    fn info(&self) -> &ChainInfo {
        &self.info
    }

    fn accounts(&self) -> &dyn AccountRegistry {
        &self.accounts
    }

    fn connect(&self, on_message: Callback<String>) -> Box<dyn JsonRpcConnection> {
        tracing::debug!(chain = %self.info.name, chain_id = %self.info.chain_id, "connect");
        self.connector.connect(on_message)
    }
}

/// A relay chain keeping the parachains registered on it.
#[derive(Debug)]
pub struct SubstrateRelayChain {
    chain: SubstrateChain,
    spec_id: String,
    keyring: Keyring,
    in_process_parachains: bool,
    parachains: RwLock<BTreeMap<ChainId, Arc<SubstrateChain>>>,
}

impl SubstrateRelayChain {
    /// Creates a relay chain whose parachains without `rpcEndpoints` are
    /// served in process.
    #[must_use]
    pub fn new(
        info: ChainInfo,
        spec_id: impl Into<String>,
        keyring: &Keyring,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            chain: SubstrateChain::new(info, keyring, connector),
            spec_id: spec_id.into(),
            keyring: keyring.clone(),
            in_process_parachains: true,
            parachains: RwLock::new(BTreeMap::new()),
        }
    }

    /// Creates a relay chain reached through `endpoints`, or in process when
    /// `endpoints` is empty. Parachains of a networked relay chain must
    /// declare their own `rpcEndpoints`.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint is not a valid WebSocket URL.
    pub fn from_endpoints(
        info: ChainInfo,
        spec_id: impl Into<String>,
        keyring: &Keyring,
        endpoints: &[String],
    ) -> Result<Self> {
        let connector = connector_for(&info, endpoints)?;
        let mut relay = Self::new(info, spec_id, keyring, connector);
        relay.in_process_parachains = endpoints.is_empty();
        Ok(relay)
    }

    /// `id` of the relay chain's own chain spec.
    #[must_use]
    pub fn spec_id(&self) -> &str {
        &self.spec_id
    }

    fn parachain_connector(&self, spec: &ChainSpec) -> Result<Arc<dyn Connector>> {
        if spec.rpc_endpoints.is_empty() && !self.in_process_parachains {
            return Err(Error::chain_spec(format!(
                "unsupported chain spec: '{}' declares no rpcEndpoints",
                spec.spec_id
            )));
        }
        connector_for(&spec.info, &spec.rpc_endpoints)
            .map_err(|e| Error::chain_spec(format!("unsupported chain spec: {e}")))
    }
}

impl Chain for SubstrateRelayChain {
    fn info(&self) -> &ChainInfo {
        self.chain.info()
    }

    fn accounts(&self) -> &dyn AccountRegistry {
        self.chain.accounts()
    }

    fn connect(&self, on_message: Callback<String>) -> Box<dyn JsonRpcConnection> {
        self.chain.connect(on_message)
    }
}

#[async_trait]
impl RelayChain for SubstrateRelayChain {
    async fn add_chain(&self, chainspec: &str) -> Result<Arc<dyn Chain>> {
        let spec = ChainSpec::parse(chainspec)?;
        if spec.relay_chain != self.spec_id {
            return Err(Error::chain_spec(format!(
                "chain spec targets relay chain '{}', not '{}'",
                spec.relay_chain, self.spec_id
            )));
        }
        let chain_id = spec.info.chain_id.clone();
        if &chain_id == self.chain_id() {
            return Err(Error::chain_spec(
                "chain spec has the identity of its relay chain",
            ));
        }
        if let Some(existing) = self
            .parachains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chain_id)
        {
            return Ok(Arc::clone(existing) as Arc<dyn Chain>);
        }

        let connector = self.parachain_connector(&spec)?;
        let chain = Arc::new(SubstrateChain::new(spec.info, &self.keyring, connector));
        let chain = Arc::clone(
            self.parachains
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(chain_id.clone())
                .or_insert(chain),
        );
        tracing::info!(
            relay = %self.spec_id,
            para_id = spec.para_id,
            %chain_id,
            "parachain added"
        );
        Ok(chain as Arc<dyn Chain>)
    }

    async fn get_chains(&self) -> Result<BTreeMap<ChainId, Arc<dyn Chain>>> {
        Ok(self
            .parachains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, chain)| (id.clone(), Arc::clone(chain) as Arc<dyn Chain>))
            .collect())
    }
}

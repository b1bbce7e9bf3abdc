//! Chains: identity, capabilities, configuration and the reference
//! implementation.
//!
//! - [`id`]: [`ChainId`], genesis or fork identity.
//! - [`spec`]: JSON chain spec parsing for [`RelayChain::add_chain`].
//! - [`config`]: relay chains configured in TOML, keyed by [`ChainId`].
//! - [`substrate`]: [`SubstrateChain`] and [`SubstrateRelayChain`].
//!
//! A [`Chain`] carries the base capability set (identity, accounts,
//! `connect`). A [`RelayChain`] adds parachain enumeration and registration.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::account::AccountRegistry;
use crate::error::Result;
use crate::transport::{Callback, JsonRpcConnection};

mod config;
mod id;
pub mod spec;
mod substrate;

pub use self::config::*;
pub use self::id::*;
pub use self::substrate::*;

/// Identity of a connectable network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    /// Unique chain identity.
    pub chain_id: ChainId,
    /// Human readable name.
    pub name: String,
    /// Native token symbol.
    pub symbol: String,
    /// Native token decimals.
    pub decimals: u8,
    /// SS58 address format of the network.
    pub ss58_format: u16,
}

/// A connectable network.
pub trait Chain: Send + Sync + std::fmt::Debug {
    /// Identity of the chain.
    fn info(&self) -> &ChainInfo;

    /// Accounts usable on this chain, with addresses in its SS58 format.
    fn accounts(&self) -> &dyn AccountRegistry;

    /// Opens an independent JSON-RPC session, delivering every inbound
    /// message to `on_message` in transport order.
    fn connect(&self, on_message: Callback<String>) -> Box<dyn JsonRpcConnection>;

    /// Shorthand for `self.info().chain_id`.
    fn chain_id(&self) -> &ChainId {
        &self.info().chain_id
    }
}

/// A chain able to host and enumerate parachains.
#[async_trait]
pub trait RelayChain: Chain {
    /// Validates and registers a parachain from its JSON chain spec.
    ///
    /// # Errors
    ///
    /// Rejects with [`Error::ChainSpec`](crate::Error::ChainSpec) when the
    /// chain spec is malformed or unsupported.
    async fn add_chain(&self, chainspec: &str) -> Result<Arc<dyn Chain>>;

    /// Currently known parachains, including those added via
    /// [`RelayChain::add_chain`].
    ///
    /// # Errors
    ///
    /// Rejects if the parachains cannot be enumerated.
    async fn get_chains(&self) -> Result<BTreeMap<ChainId, Arc<dyn Chain>>>;
}

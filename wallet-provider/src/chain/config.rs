//! Relay chain configuration and `ChainId` keyed TOML (de)serialisation.

use std::ops::Deref;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{ChainId, ChainInfo};
use crate::ss58;

/// Inner configuration for a relay chain (matches TOML structure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayChainConfigInner {
    /// Human readable name.
    pub name: String,
    /// `id` of the relay chain's spec; parachain specs name it in `relay_chain`.
    pub id: String,
    /// Native token symbol.
    pub symbol: String,
    /// Native token decimals.
    pub decimals: u8,
    /// SS58 address format (default: 42).
    #[serde(default = "default_ss58_format")]
    pub ss58_format: u16,
    /// WebSocket endpoints; empty serves the chain in process.
    #[serde(default)]
    pub rpc: Vec<String>,
    /// Parachain chain spec files registered at startup.
    #[serde(default)]
    pub parachains: Vec<PathBuf>,
}

const fn default_ss58_format() -> u16 {
    ss58::GENERIC_FORMAT
}

/// Full relay chain configuration with its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayChainConfig {
    /// Identity of the relay chain.
    pub chain_id: ChainId,
    /// TOML-level configuration.
    pub inner: RelayChainConfigInner,
}

impl RelayChainConfig {
    /// Chain identity described by this entry.
    #[must_use]
    pub fn info(&self) -> ChainInfo {
        ChainInfo {
            chain_id: self.chain_id.clone(),
            name: self.inner.name.clone(),
            symbol: self.inner.symbol.clone(),
            decimals: self.inner.decimals,
            ss58_format: self.inner.ss58_format,
        }
    }
}

/// Ordered collection of [`RelayChainConfig`] entries.
///
/// Serialised as a TOML map keyed by hex chain identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainsConfig(pub Vec<RelayChainConfig>);

impl Deref for ChainsConfig {
    type Target = Vec<RelayChainConfig>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Serialize for ChainsConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for chain_config in &self.0 {
            map.serialize_entry(&chain_config.chain_id, &chain_config.inner)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ChainsConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use std::fmt;

        use serde::de::{MapAccess, Visitor};

        struct ChainsVisitor;

        impl<'de> Visitor<'de> for ChainsVisitor {
            type Value = ChainsConfig;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of chain identifiers to relay chain configurations")
            }

            fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut chains: Vec<RelayChainConfig> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));

                while let Some(chain_id) = access.next_key::<ChainId>()? {
                    if chains.iter().any(|c| c.chain_id == chain_id) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate chain {chain_id}"
                        )));
                    }
                    let inner: RelayChainConfigInner = access.next_value()?;
                    if inner.ss58_format > ss58::MAX_FORMAT {
                        return Err(serde::de::Error::custom(format!(
                            "ss58_format {} of chain {chain_id} is out of range",
                            inner.ss58_format
                        )));
                    }
                    chains.push(RelayChainConfig { chain_id, inner });
                }

                Ok(ChainsConfig(chains))
            }
        }

        deserializer.deserialize_map(ChainsVisitor)
    }
}

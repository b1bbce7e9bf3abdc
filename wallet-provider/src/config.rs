//! Configuration loading and default template generation.
//!
//! This module provides:
//!
//! - [`Config`]: Top-level settings (log level, relay chains keyed by
//!   [`ChainId`](crate::chain::ChainId), keyring accounts).
//! - [`load_config`]: Reads and parses a TOML configuration file.
//! - [`generate_default_config`]: Produces a commented TOML template.
//!
//! # Configuration File Format
//!
//! ```toml
//! log_level = "info"
//!
//! [chains."0x91b171bb158e2d3848fa23a9f1c25182fb8e20313b2c1eb49219da7a70ce90c3"]
//! name = "Polkadot"
//! id = "polkadot"
//! symbol = "DOT"
//! decimals = 10
//! ss58_format = 0
//! rpc = ["wss://rpc.polkadot.io"]
//!
//! [[accounts]]
//! name = "Alice"
//! seed = "$ALICE_SEED"
//! allowlist = ["*"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chain::ChainsConfig;
use crate::error::Error;
use crate::signers::AccountConfig;

/// Wallet provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Relay chains served by the provider.
    #[serde(default)]
    pub chains: ChainsConfig,
    /// Accounts loaded into the keyring.
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// Load configuration from a TOML file at the given path.
///
/// # Errors
///
/// Returns an error if the file cannot be resolved, read, or parsed.
pub fn load_config(path: &Path) -> Result<Config, Error> {
    let config_path = path.canonicalize().map_err(|e| {
        Error::config_with(
            format!("failed to resolve config path '{}'", path.display()),
            e,
        )
    })?;
    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        Error::config_with(
            format!("failed to read config file '{}'", config_path.display()),
            e,
        )
    })?;
    let config: Config = toml::from_str(&content).map_err(|e| {
        Error::config_with(
            format!("failed to parse TOML config '{}'", config_path.display()),
            e,
        )
    })?;
    tracing::debug!(
        path = %config_path.display(),
        chains = config.chains.len(),
        accounts = config.accounts.len(),
        "config loaded"
    );
    Ok(config)
}

/// Generate a default TOML configuration template.
#[must_use]
pub fn generate_default_config() -> String {
    String::from(
        r#"# Wallet Provider Configuration

# Log filter, overridden by RUST_LOG.
log_level = "info"

# ── Relay chains ────────────────────────────────────────────────────
# Key format: "0x<genesis hash>"
# `rpc` lists WebSocket endpoints tried in order; leave it empty to serve
# the chain from the built-in in-process node.
# `parachains` lists JSON chain spec files registered at startup.

[chains."0x91b171bb158e2d3848fa23a9f1c25182fb8e20313b2c1eb49219da7a70ce90c3"]
name = "Polkadot"
id = "polkadot"
symbol = "DOT"
decimals = 10
ss58_format = 0
rpc = ["wss://rpc.polkadot.io"]

[chains."0xe143f23803ac50e8f6f8e62695d1ce9e4e1d68aa36c1cd2cfd15340213f3423e"]
name = "Westend"
id = "westend"
symbol = "WND"
decimals = 12
ss58_format = 42
rpc = []
parachains = []

# ── Accounts ────────────────────────────────────────────────────────
# `seed` is a 32-byte ed25519 seed in hex, or an environment variable
# reference: "$VAR" or "${VAR}".
# `allowlist` names the origins allowed to request signatures; "*" allows
# every origin and an empty list allows none.

[[accounts]]
name = "Alice"
seed = "$ALICE_SEED"
allowlist = ["*"]
"#,
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_template_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("info"));
        assert_eq!(config.chains.len(), 2);
        assert_eq!(config.chains[0].inner.id, "polkadot");
        assert!(config.chains[1].inner.rpc.is_empty());
        assert_eq!(config.accounts.len(), 1);
        assert!(config.accounts[0].allowlist.contains("*"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(generate_default_config().as_bytes()).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.accounts[0].seed, "$ALICE_SEED");
    }

    #[test]
    fn empty_file_is_an_empty_config() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(load_config(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"chains = 3").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse TOML config"));
    }
}

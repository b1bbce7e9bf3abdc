//! Account configuration and seed resolution.
//!
//! This module handles the `[[accounts]]` section of the TOML config:
//!
//! - **Seeds**: 32-byte ed25519 seeds written as hex, `0x` prefix optional.
//! - **Environment references**: a seed written as `$VAR` or `${VAR}` is
//!   read from the environment (after `.env` is loaded), keeping secrets out
//!   of the config file.
//! - **Keyring construction**: every entry becomes a [`Keyring`] key with its
//!   display name and allowlist.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::keyring::Keyring;

/// One `[[accounts]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Display name shown to dapps.
    #[serde(default)]
    pub name: Option<String>,
    /// Hex seed or environment reference.
    pub seed: String,
    /// Origins allowed to request signatures; `"*"` allows all.
    #[serde(default)]
    pub allowlist: BTreeSet<String>,
}

/// Resolve an environment-variable reference (`$VAR` or `${VAR}`), returning
/// the literal string unchanged if it does not match either pattern.
fn resolve_env(value: &str) -> Result<String, Error> {
    // ${VAR} syntax
    if let Some(var_name) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        return std::env::var(var_name).map_err(|_| {
            Error::Signer(format!(
                "env var '{var_name}' not found (referenced as '{value}')"
            ))
        });
    }
    // $VAR syntax
    if let Some(var_name) = value.strip_prefix('$').filter(|v| !v.is_empty())
        && var_name.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return std::env::var(var_name).map_err(|_| {
            Error::Signer(format!(
                "env var '{var_name}' not found (referenced as '{value}')"
            ))
        });
    }
    // Literal value
    Ok(value.to_owned())
}

/// Decode a 32-byte seed from hex.
fn decode_seed(raw: &str) -> Result<[u8; 32], Error> {
    let trimmed = raw.trim();
    let bytes = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|e| Error::signer(format!("seed is not valid hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| Error::signer(format!("seed must be 32 bytes, got {}", b.len())))
}

/// Build a [`Keyring`] holding every configured account.
///
/// # Errors
///
/// Returns an error if a seed references a missing environment variable, is
/// not 32 bytes of hex, or duplicates another account.
pub fn build_keyring(accounts: &[AccountConfig]) -> Result<Keyring, Error> {
    let keyring = Keyring::new();
    for (index, account) in accounts.iter().enumerate() {
        let label = account
            .name
            .clone()
            .unwrap_or_else(|| format!("accounts[{index}]"));
        let seed = resolve_env(&account.seed)
            .and_then(|s| decode_seed(&s))
            .map_err(|e| Error::signer(format!("{label}: {e}")))?;
        keyring.add(&seed, account.name.clone(), account.allowlist.clone())?;
    }
    Ok(keyring)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "0x9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

    fn account(seed: &str) -> AccountConfig {
        AccountConfig {
            name: Some("Alice".to_owned()),
            seed: seed.to_owned(),
            allowlist: ["*".to_owned()].into(),
        }
    }

    #[test]
    fn literal_values_pass_through() {
        assert_eq!(resolve_env("abc").unwrap(), "abc");
        assert_eq!(resolve_env("$").unwrap(), "$");
        assert_eq!(resolve_env("$not-a-var").unwrap(), "$not-a-var");
    }

    #[test]
    fn missing_env_vars_are_reported() {
        let err = resolve_env("${WALLET_PROVIDER_TEST_MISSING_VAR}").unwrap_err();
        assert!(err.to_string().contains("WALLET_PROVIDER_TEST_MISSING_VAR"));
        assert!(resolve_env("$WALLET_PROVIDER_TEST_MISSING_VAR").is_err());
    }

    #[test]
    fn env_references_resolve() {
        // PATH is set in any test environment.
        let path = std::env::var("PATH").unwrap();
        assert_eq!(resolve_env("$PATH").unwrap(), path);
        assert_eq!(resolve_env("${PATH}").unwrap(), path);
    }

    #[test]
    fn decodes_seeds() {
        assert_eq!(decode_seed(SEED).unwrap()[0], 0x9d);
        assert_eq!(decode_seed(&SEED[2..]).unwrap()[31], 0x60);
        assert!(decode_seed("0x1234").is_err());
        assert!(decode_seed("zz").is_err());
    }

    #[test]
    fn builds_keyring_from_accounts() {
        let keyring = build_keyring(&[account(SEED)]).unwrap();
        let keys = keyring.keys();
        assert_eq!(keys.len(), 1);
        // RFC 8032 test vector 1.
        assert_eq!(
            hex::encode(keys[0].public_key),
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a"
        );
        assert_eq!(keys[0].display_name.as_deref(), Some("Alice"));

        assert!(build_keyring(&[account(SEED), account(SEED)]).is_err());
        let err = build_keyring(&[account("0x00")]).unwrap_err();
        assert!(err.to_string().contains("Alice"));
    }
}

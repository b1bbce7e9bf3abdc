//! Wallet provider contract and reference provider for Substrate-based chains.
//!
//! A dapp obtains a [`WalletProvider`], enumerates its [`RelayChain`]s and
//! their parachains, lists [`Account`]s through an [`AccountRegistry`], asks
//! accounts to sign a [`SignPayload`], and talks JSON-RPC to a chain through a
//! [`JsonRpcConnection`](transport::JsonRpcConnection).
//!
//! The traits are the contract. [`LocalWalletProvider`] is a complete
//! implementation backed by an ed25519 [`Keyring`](keyring::Keyring), relay
//! chains from TOML configuration, parachains from JSON chain specs, and
//! WebSocket or in-process transports.
//!
//! ```no_run
//! # async fn demo() -> wallet_provider::Result<()> {
//! use std::path::Path;
//! use wallet_provider::{Chain, WalletProvider, config, provider};
//!
//! let config = config::load_config(Path::new("config.toml"))?;
//! let provider = provider::build_wallet_provider(&config).await?;
//! for (chain_id, relay) in provider.get_chains().await? {
//!     println!("{chain_id}: {}", relay.info().name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod chain;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod keyring;
pub mod provider;
pub mod signer;
pub mod signers;
pub mod ss58;
pub mod telemetry;
pub mod transport;

pub use account::{Account, AccountRegistry, PolkadotSigner, Subscription};
pub use chain::{Chain, ChainId, ChainInfo, RelayChain};
pub use error::{Error, ErrorKind, Result};
pub use provider::{LocalWalletProvider, WalletProvider};
pub use signer::SignPayload;

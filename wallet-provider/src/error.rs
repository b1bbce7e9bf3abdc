//! Unified error types for the wallet provider.
//!
//! Every fallible operation of the provider contract rejects with an
//! [`Error`]. [`Error::kind`] groups variants into the three failure classes
//! callers care about (enumeration, validation, authorization) plus the
//! ambient ones (configuration, signer keys, transport).

use thiserror::Error;

/// Top-level error type for the wallet provider.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file could not be resolved, read, or parsed.
    #[error("config: {0}")]
    Config(String),

    /// Signer key resolution or decoding failed.
    #[error("signer: {0}")]
    Signer(String),

    /// The provider has not been initialised with any relay chains yet.
    #[error("provider is not initialised")]
    NotInitialized,

    /// Chains could not be enumerated or a chain handle could not be built.
    #[error("chain: {0}")]
    Chain(String),

    /// A chain spec passed to `add_chain` is malformed or unsupported.
    #[error("chain spec: {0}")]
    ChainSpec(String),

    /// A signing request is structurally invalid.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The calling origin is not in the account's allowlist.
    #[error("origin '{origin}' is not allowed to use account {address}")]
    Unauthorized {
        /// Origin that requested the signature.
        origin: String,
        /// Address of the account.
        address: String,
    },

    /// The account has been revoked by its owner.
    #[error("account {0} has been revoked")]
    Revoked(String),

    /// The account is no longer present in the registry.
    #[error("account {0} not found")]
    AccountNotFound(String),

    /// Transport setup or I/O failure.
    #[error("transport: {0}")]
    Transport(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration or key material problem.
    Config,
    /// The provider or a chain could not produce the requested listing.
    Enumeration,
    /// Caller-supplied input was rejected.
    Validation,
    /// The caller is not permitted to perform the operation.
    Authorization,
    /// The underlying connection failed.
    Transport,
}

impl Error {
    /// Creates an [`Error::Config`] from a message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an [`Error::Config`] from a context message and a source error.
    pub fn config_with(context: impl std::fmt::Display, source: impl std::fmt::Display) -> Self {
        Self::Config(format!("{context}: {source}"))
    }

    /// Creates an [`Error::Signer`] from a message.
    pub fn signer(msg: impl Into<String>) -> Self {
        Self::Signer(msg.into())
    }

    /// Creates an [`Error::Chain`] from a message.
    pub fn chain(msg: impl Into<String>) -> Self {
        Self::Chain(msg.into())
    }

    /// Creates an [`Error::ChainSpec`] from a message.
    pub fn chain_spec(msg: impl Into<String>) -> Self {
        Self::ChainSpec(msg.into())
    }

    /// Creates an [`Error::Transport`] from a context message and a source error.
    pub fn transport_with(context: impl std::fmt::Display, source: impl std::fmt::Display) -> Self {
        Self::Transport(format!("{context}: {source}"))
    }

    /// Returns the failure class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Signer(_) => ErrorKind::Config,
            Self::NotInitialized | Self::Chain(_) => ErrorKind::Enumeration,
            Self::ChainSpec(_) | Self::InvalidPayload(_) => ErrorKind::Validation,
            Self::Unauthorized { .. } | Self::Revoked(_) | Self::AccountNotFound(_) => {
                ErrorKind::Authorization
            }
            Self::Transport(_) => ErrorKind::Transport,
        }
    }
}

/// Convenience result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_failure_classes() {
        assert_eq!(Error::NotInitialized.kind(), ErrorKind::Enumeration);
        assert_eq!(Error::chain_spec("empty").kind(), ErrorKind::Validation);
        assert_eq!(
            Error::Revoked("5Grw".to_owned()).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            Error::config_with("failed to read 'a.toml'", "denied").to_string(),
            "config: failed to read 'a.toml': denied"
        );
    }
}

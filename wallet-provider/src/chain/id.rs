//! Chain identity.
//!
//! A chain is identified by the pair `(hash_of_forked_block,
//! block_number_of_forked_block)`. A chain that never forked is identified by
//! `(genesis_hash, 0)` and is written as just the 32-byte genesis hash. A
//! forked chain appends the SCALE compact encoding of the fork block number to
//! the fork block hash, so its identifier is always longer than 32 bytes.

use std::fmt;
use std::str::FromStr;

use parity_scale_codec::{Compact, Decode, Encode};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length in bytes of a block hash.
pub const HASH_LEN: usize = 32;

/// Error returned when a string is not a valid [`ChainId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseChainIdError {
    /// The string is not hex.
    #[error("chain id is not valid hex: {0}")]
    Hex(String),
    /// Fewer than 32 bytes.
    #[error("chain id must be at least {HASH_LEN} bytes, got {0}")]
    TooShort(usize),
    /// Bytes after the hash are not a single compact integer.
    #[error("chain id suffix is not a compact-encoded block number")]
    BadForkNumber,
}

/// Unique identity of a chain, compared byte for byte.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainId(Vec<u8>);

impl ChainId {
    /// Identity of a chain that has not experienced any fork.
    #[must_use]
    pub fn genesis(genesis_hash: [u8; HASH_LEN]) -> Self {
        Self(genesis_hash.to_vec())
    }

    /// Identity of a chain forked at `block_number`, whose block hash at that
    /// height is `fork_hash`.
    ///
    /// A fork at block 0 still carries the encoded number and is therefore
    /// distinct from [`ChainId::genesis`] with the same hash.
    #[must_use]
    pub fn forked(fork_hash: [u8; HASH_LEN], block_number: u64) -> Self {
        let mut bytes = fork_hash.to_vec();
        Compact(block_number).encode_to(&mut bytes);
        Self(bytes)
    }

    /// Builds an identity from raw bytes, validating its layout.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is shorter than 32 bytes or its suffix is
    /// not exactly one compact-encoded integer.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ParseChainIdError> {
        if bytes.len() < HASH_LEN {
            return Err(ParseChainIdError::TooShort(bytes.len()));
        }
        if bytes.len() > HASH_LEN {
            let mut suffix = &bytes[HASH_LEN..];
            Compact::<u64>::decode(&mut suffix).map_err(|_| ParseChainIdError::BadForkNumber)?;
            if !suffix.is_empty() {
                return Err(ParseChainIdError::BadForkNumber);
            }
        }
        Ok(Self(bytes))
    }

    /// Raw identity bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hash of the genesis block, or of the fork block for forked chains.
    #[must_use]
    pub fn block_hash(&self) -> [u8; HASH_LEN] {
        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(&self.0[..HASH_LEN]);
        hash
    }

    /// Block number of the fork, `None` for unforked chains.
    #[must_use]
    pub fn fork_block_number(&self) -> Option<u64> {
        let mut suffix = self.0.get(HASH_LEN..).filter(|s| !s.is_empty())?;
        Compact::<u64>::decode(&mut suffix).ok().map(|c| c.0)
    }

    /// Whether this identity carries a fork block number.
    #[must_use]
    pub fn is_forked(&self) -> bool {
        self.0.len() > HASH_LEN
    }

    /// `0x`-prefixed lowercase hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainId({})", self.to_hex())
    }
}

impl FromStr for ChainId {
    type Err = ParseChainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| ParseChainIdError::Hex(e.to_string()))?;
        Self::from_bytes(bytes)
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

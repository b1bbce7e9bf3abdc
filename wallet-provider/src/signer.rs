//! Signing payloads.
//!
//! The bytes actually signed are `call_data`, then every extension's `value`,
//! then every extension's `additional_signed`, both in the order the
//! extensions were declared. Payloads longer than 256 bytes are hashed first,
//! with the caller's hasher or blake2-256.

use std::fmt;
use std::sync::Arc;

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Payloads above this many bytes are hashed before signing.
pub const MAX_UNHASHED_PAYLOAD: usize = 256;

/// Magic prefix of SCALE-encoded runtime metadata.
pub const METADATA_MAGIC: &[u8; 4] = b"meta";

/// Hash function applied to oversized payloads.
pub type Hasher = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// blake2b with a 256-bit output.
#[must_use]
pub fn blake2_256(data: &[u8]) -> [u8; 32] {
    Blake2b::<U32>::digest(data).into()
}

/// Hex (de)serialisation for byte fields, `0x` prefix optional on input.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialises bytes as `0x`-prefixed hex.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    /// Parses hex with or without the `0x` prefix.
    ///
    /// # Errors
    ///
    /// Fails on invalid hex.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}

/// A named piece of transaction context included in what is signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedExtension {
    /// Identifier declared in the runtime metadata.
    pub identifier: String,
    /// Value included in the extrinsic.
    #[serde(with = "hex_bytes")]
    pub value: Vec<u8>,
    /// Implicit data signed but not included in the extrinsic.
    #[serde(with = "hex_bytes")]
    pub additional_signed: Vec<u8>,
}

/// Data submitted for signing.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPayload {
    /// SCALE-encoded call.
    #[serde(with = "hex_bytes")]
    pub call_data: Vec<u8>,
    /// Extensions by name, in declaration order.
    pub signed_extensions: IndexMap<String, SignedExtension>,
    /// SCALE-encoded runtime metadata the payload was built against.
    #[serde(with = "hex_bytes")]
    pub metadata: Vec<u8>,
    /// Block the signing context is pinned to.
    pub at_block_number: u32,
    /// Replaces blake2-256 for oversized payloads.
    #[serde(skip)]
    pub hasher: Option<Hasher>,
}

impl fmt::Debug for SignPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignPayload")
            .field("call_data", &hex::encode(&self.call_data))
            .field("signed_extensions", &self.signed_extensions)
            .field("metadata_len", &self.metadata.len())
            .field("at_block_number", &self.at_block_number)
            .field("hasher", &self.hasher.is_some())
            .finish()
    }
}

impl SignPayload {
    /// Builds the bytes to sign.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] if `call_data` is empty or
    /// `metadata` is not SCALE-encoded runtime metadata.
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        if self.call_data.is_empty() {
            return Err(Error::InvalidPayload("call data is empty".to_owned()));
        }
        if !self.metadata.starts_with(METADATA_MAGIC) {
            return Err(Error::InvalidPayload(
                "metadata does not start with the metadata magic".to_owned(),
            ));
        }

        let mut payload = self.call_data.clone();
        for extension in self.signed_extensions.values() {
            payload.extend_from_slice(&extension.value);
        }
        for extension in self.signed_extensions.values() {
            payload.extend_from_slice(&extension.additional_signed);
        }

        if payload.len() > MAX_UNHASHED_PAYLOAD {
            return Ok(match &self.hasher {
                Some(hasher) => hasher(&payload),
                None => blake2_256(&payload).to_vec(),
            });
        }
        Ok(payload)
    }
}

//! SS58 address encoding for 32-byte account public keys.
//!
//! `address = base58(prefix ‖ public_key ‖ checksum)`, where `checksum` is the
//! first two bytes of `blake2b-512("SS58PRE" ‖ prefix ‖ public_key)`. Network
//! formats below 64 take one prefix byte, formats up to 16383 take two.

use blake2::{Blake2b512, Digest};

const PREFIX: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;
const KEY_LEN: usize = 32;

/// Highest network format representable in an SS58 prefix.
pub const MAX_FORMAT: u16 = 16_383;

/// Generic Substrate format, used when a chain declares none.
pub const GENERIC_FORMAT: u16 = 42;

/// Error returned when decoding an SS58 address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Ss58Error {
    /// Not valid base58.
    #[error("address is not valid base58")]
    Base58,
    /// Prefix byte outside the defined ranges.
    #[error("invalid address prefix")]
    Prefix,
    /// Decoded payload is not a 32-byte account.
    #[error("invalid address length")]
    Length,
    /// Checksum mismatch.
    #[error("invalid address checksum")]
    Checksum,
    /// Format above [`MAX_FORMAT`].
    #[error("network format {0} is out of range")]
    Format(u16),
}

fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Blake2b512::new();
    hasher.update(PREFIX);
    hasher.update(data);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}

fn encode_prefix(format: u16) -> Vec<u8> {
    if format < 64 {
        #[allow(clippy::cast_possible_truncation)]
        vec![format as u8]
    } else {
        #[allow(clippy::cast_possible_truncation)]
        let first = (((format & 0b0000_0000_1111_1100) >> 2) as u8) | 0b0100_0000;
        #[allow(clippy::cast_possible_truncation)]
        let second = ((format >> 8) as u8) | (((format & 0b0000_0000_0000_0011) as u8) << 6);
        vec![first, second]
    }
}

/// Encode `public_key` as an SS58 address for network `format`.
///
/// # Errors
///
/// Returns [`Ss58Error::Format`] if `format` exceeds [`MAX_FORMAT`].
pub fn encode(public_key: &[u8; KEY_LEN], format: u16) -> Result<String, Ss58Error> {
    if format > MAX_FORMAT {
        return Err(Ss58Error::Format(format));
    }
    let mut data = encode_prefix(format);
    data.extend_from_slice(public_key);
    let sum = checksum(&data);
    data.extend_from_slice(&sum);
    Ok(bs58::encode(data).into_string())
}

/// Decode an SS58 address into its public key and network format.
///
/// # Errors
///
/// Returns an error if the address is not base58, has an invalid prefix,
/// does not carry a 32-byte key, or fails its checksum.
pub fn decode(address: &str) -> Result<([u8; KEY_LEN], u16), Ss58Error> {
    let data = bs58::decode(address)
        .into_vec()
        .map_err(|_| Ss58Error::Base58)?;
    let (prefix_len, format) = match data.first().copied() {
        Some(b @ 0..=63) => (1, u16::from(b)),
        Some(b0 @ 64..=127) => {
            let b1 = *data.get(1).ok_or(Ss58Error::Length)?;
            let lower = (b0 << 2) | (b1 >> 6);
            let upper = b1 & 0b0011_1111;
            (2, u16::from(lower) | (u16::from(upper) << 8))
        }
        _ => return Err(Ss58Error::Prefix),
    };
    if data.len() != prefix_len + KEY_LEN + CHECKSUM_LEN {
        return Err(Ss58Error::Length);
    }
    let body_end = prefix_len + KEY_LEN;
    if checksum(&data[..body_end]) != data[body_end..] {
        return Err(Ss58Error::Checksum);
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&data[prefix_len..body_end]);
    Ok((key, format))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: [u8; 32] = [
        0xd4, 0x35, 0x93, 0xc7, 0x15, 0xfd, 0xd3, 0x1c, 0x61, 0x14, 0x1a, 0xbd, 0x04, 0xa9, 0x9f,
        0xd6, 0x82, 0x2c, 0x85, 0x58, 0x85, 0x4c, 0xcd, 0xe3, 0x9a, 0x56, 0x84, 0xe7, 0xa5, 0x6d,
        0xa2, 0x7d,
    ];

    #[test]
    fn encodes_known_addresses() {
        assert_eq!(
            encode(&ALICE, GENERIC_FORMAT).unwrap(),
            "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"
        );
        assert_eq!(
            encode(&ALICE, 0).unwrap(),
            "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5"
        );
    }

    #[test]
    fn decodes_one_and_two_byte_prefixes() {
        for format in [0, 2, 42, 63, 64, 255, 1284, MAX_FORMAT] {
            let address = encode(&ALICE, format).unwrap();
            assert_eq!(decode(&address).unwrap(), (ALICE, format), "format {format}");
        }
    }

    #[test]
    fn rejects_bad_checksum_and_format() {
        let address = encode(&ALICE, GENERIC_FORMAT).unwrap();
        let mut raw = bs58::decode(&address).into_vec().unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        let tampered = bs58::encode(raw).into_string();
        assert_eq!(decode(&tampered), Err(Ss58Error::Checksum));
        assert_eq!(decode("0OIl"), Err(Ss58Error::Base58));
        assert_eq!(encode(&ALICE, 16_384), Err(Ss58Error::Format(16_384)));
    }
}

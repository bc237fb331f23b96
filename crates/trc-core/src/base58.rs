//! Base58 with a 4-byte double-SHA256 checksum.
//!
//! Thin wrapper over `bs58` so callers see [`Base58Error`] rather than the
//! library's error type.

use crate::error::Base58Error;

/// Encode `payload` followed by its checksum.
pub fn encode_check(payload: &[u8]) -> String {
    bs58::encode(payload).with_check().into_string()
}

/// Decode a checksummed string and return the payload without checksum.
pub fn decode_check(s: &str) -> Result<Vec<u8>, Base58Error> {
    bs58::decode(s)
        .with_check(None)
        .into_vec()
        .map_err(|e| match e {
            bs58::decode::Error::InvalidCharacter { character, index } => {
                Base58Error::InvalidCharacter { character, index }
            }
            bs58::decode::Error::NonAsciiCharacter { index } => Base58Error::InvalidCharacter {
                character: s[index..].chars().next().unwrap_or('?'),
                index,
            },
            bs58::decode::Error::InvalidChecksum { .. } => Base58Error::InvalidChecksum,
            bs58::decode::Error::NoChecksum => Base58Error::NoChecksum,
            other => Base58Error::Other(other.to_string()),
        })
}

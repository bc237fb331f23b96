//! secp256k1 key types, hashing helpers and WIF encoding.
//!
//! Public keys are `secp256k1::PublicKey` and are always serialized
//! compressed. [`PrivateKey`] wraps a `secp256k1::SecretKey` together with the
//! network it is encoded for and erases the scalar on drop.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use secp256k1::{SecretKey, SECP256K1};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

use crate::base58;
use crate::constants::{Network, ScriptType};
use crate::error::CryptoError;

pub use secp256k1::PublicKey;

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// RIPEMD-160 of SHA-256 of `data`.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}

/// HMAC-SHA512 keyed with `key`.
pub fn hmac_sha512(key: &[u8], data: &[u8]) -> [u8; 64] {
    let mut mac =
        <Hmac<Sha512> as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Parse a hex-encoded compressed or uncompressed public key.
pub fn public_key_from_hex(s: &str) -> Result<PublicKey, CryptoError> {
    let bytes = hex::decode(s.trim()).map_err(|_| CryptoError::InvalidPublicKey)?;
    PublicKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPublicKey)
}

/// A secp256k1 private scalar bound to a network.
///
/// The `Debug` form never prints the scalar.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SecretKey,
    network: Network,
    compressed: bool,
}

impl PrivateKey {
    /// Wrap an existing secret key.
    pub fn new(inner: SecretKey, network: Network) -> Self {
        Self {
            inner,
            network,
            compressed: true,
        }
    }

    /// Generate a random key from the OS RNG.
    pub fn generate(network: Network) -> Self {
        Self::new(SecretKey::new(&mut rand::rngs::OsRng), network)
    }

    /// Create a key from 32 big-endian bytes; fails when out of range.
    pub fn from_slice(bytes: &[u8], network: Network) -> Result<Self, CryptoError> {
        let inner = SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self::new(inner, network))
    }

    /// Decode a plain WIF string.
    pub fn from_wif(wif: &str) -> Result<Self, CryptoError> {
        let data = base58::decode_check(wif)?;
        let (prefix, body) = data.split_first().ok_or(CryptoError::InvalidPrivateKey)?;
        let network = Network::ALL
            .into_iter()
            .find(|n| n.wif_prefix() == *prefix)
            .ok_or(CryptoError::UnknownWifPrefix(*prefix))?;
        let compressed = match body.len() {
            32 => false,
            33 if body[32] == 0x01 => true,
            _ => return Err(CryptoError::InvalidPrivateKey),
        };
        let inner = SecretKey::from_slice(&body[..32]).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self {
            inner,
            network,
            compressed,
        })
    }

    /// Encode as WIF.
    pub fn to_wif(&self) -> String {
        let mut payload = Vec::with_capacity(34);
        payload.push(self.network.wif_prefix());
        payload.extend_from_slice(&self.inner.secret_bytes());
        if self.compressed {
            payload.push(0x01);
        }
        let s = base58::encode_check(&payload);
        payload.iter_mut().for_each(|b| *b = 0);
        s
    }

    /// The matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(SECP256K1, &self.inner)
    }

    /// Borrow the underlying secret key.
    pub fn secret_key(&self) -> &SecretKey {
        &self.inner
    }

    /// Raw scalar bytes. Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.inner.secret_bytes()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Export as `"<script>:<WIF>"`, e.g. `p2pkh:L4rY...`.
    pub fn to_typed_wif(&self, script_type: ScriptType) -> String {
        format!("{}:{}", script_type.wif_label(), self.to_wif())
    }

    /// Parse `"<script>:<WIF>"` or a bare WIF (which defaults to p2pkh).
    pub fn from_typed_wif(s: &str) -> Result<(ScriptType, Self), CryptoError> {
        match s.split_once(':') {
            Some((label, wif)) => Ok((ScriptType::from_label(label)?, Self::from_wif(wif)?)),
            None => Ok((ScriptType::P2pkh, Self::from_wif(s)?)),
        }
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.inner.non_secure_erase();
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
            && self.network == other.network
            && self.compressed == other.compressed
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key())
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

impl FromStr for PrivateKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wif(s)
    }
}

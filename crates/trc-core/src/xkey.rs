//! Extended key encoding, decoding and variant conversion.
//!
//! # Wire format
//! ```text
//! version (4) || depth (1) || parent_fingerprint (4) || child_number (4, BE)
//!   || chain_code (32) || key_material (33)
//! ```
//! followed by a 4-byte double-SHA256 checksum and base58 encoded. Private
//! key material is `0x00 || scalar`, public key material is a compressed
//! point. The version prefix selects network, script type and kind from a
//! closed table (see [`ScriptType::xkey_versions`]).

use secp256k1::{SecretKey, SECP256K1};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::base58;
use crate::constants::{Network, ScriptType, XKEY_LEN};
use crate::crypto::{hash160, PrivateKey, PublicKey};
use crate::derivation::ChildNumber;
use crate::error::KeyError;

/// Whether an extended key carries a private scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    Public,
    Private,
}

/// One entry of the version table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyVersion {
    pub network: Network,
    pub script_type: ScriptType,
    pub kind: KeyKind,
}

impl KeyVersion {
    pub fn new(network: Network, script_type: ScriptType, kind: KeyKind) -> Self {
        Self {
            network,
            script_type,
            kind,
        }
    }

    /// The 4 version bytes for this entry.
    pub fn to_bytes(&self) -> [u8; 4] {
        let (prv, publ) = self.script_type.xkey_versions(self.network);
        match self.kind {
            KeyKind::Private => prv,
            KeyKind::Public => publ,
        }
    }

    /// Look up version bytes in the table.
    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        for network in Network::ALL {
            for script_type in ScriptType::ALL {
                let (prv, publ) = script_type.xkey_versions(network);
                if bytes == prv {
                    return Some(Self::new(network, script_type, KeyKind::Private));
                }
                if bytes == publ {
                    return Some(Self::new(network, script_type, KeyKind::Public));
                }
            }
        }
        None
    }
}

impl fmt::Display for KeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            KeyKind::Private => "private",
            KeyKind::Public => "public",
        };
        write!(f, "{} {} {}", self.network, self.script_type, kind)
    }
}

/// Key material held by an extended key.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    Public(PublicKey),
    Private(SecretKey),
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        if let KeyMaterial::Private(sk) = self {
            sk.non_secure_erase();
        }
    }
}

/// A BIP-32 extended key.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedKey {
    network: Network,
    script_type: ScriptType,
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: ChildNumber,
    chain_code: [u8; 32],
    key: KeyMaterial,
}

impl ExtendedKey {
    /// Assemble an extended key from its parts.
    pub fn new(
        network: Network,
        script_type: ScriptType,
        depth: u8,
        parent_fingerprint: [u8; 4],
        child_number: ChildNumber,
        chain_code: [u8; 32],
        key: KeyMaterial,
    ) -> Self {
        Self {
            network,
            script_type,
            depth,
            parent_fingerprint,
            child_number,
            chain_code,
            key,
        }
    }

    pub fn version(&self) -> KeyVersion {
        KeyVersion::new(self.network, self.script_type, self.kind())
    }

    pub fn kind(&self) -> KeyKind {
        match self.key {
            KeyMaterial::Public(_) => KeyKind::Public,
            KeyMaterial::Private(_) => KeyKind::Private,
        }
    }

    pub fn is_private(&self) -> bool {
        self.kind() == KeyKind::Private
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn script_type(&self) -> ScriptType {
        self.script_type
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    pub fn child_number(&self) -> ChildNumber {
        self.child_number
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn key_material(&self) -> &KeyMaterial {
        &self.key
    }

    /// The public key, computed from the scalar for private keys.
    pub fn public_key(&self) -> PublicKey {
        match &self.key {
            KeyMaterial::Public(pk) => *pk,
            KeyMaterial::Private(sk) => PublicKey::from_secret_key(SECP256K1, sk),
        }
    }

    /// The private key, if this extended key carries one.
    pub fn private_key(&self) -> Option<PrivateKey> {
        match &self.key {
            KeyMaterial::Private(sk) => Some(PrivateKey::new(*sk, self.network)),
            KeyMaterial::Public(_) => None,
        }
    }

    /// HASH160 of the compressed public key.
    pub fn identifier(&self) -> [u8; 20] {
        hash160(&self.public_key().serialize())
    }

    /// First four bytes of the identifier.
    pub fn fingerprint(&self) -> [u8; 4] {
        let id = self.identifier();
        [id[0], id[1], id[2], id[3]]
    }

    /// Public projection: same metadata and chain code, public key material.
    pub fn neuter(&self) -> ExtendedKey {
        Self {
            key: KeyMaterial::Public(self.public_key()),
            ..self.clone()
        }
    }

    /// Serialize to the 78-byte payload (no checksum).
    pub fn to_bytes(&self) -> [u8; XKEY_LEN] {
        let mut out = [0u8; XKEY_LEN];
        out[0..4].copy_from_slice(&self.version().to_bytes());
        out[4] = self.depth;
        out[5..9].copy_from_slice(&self.parent_fingerprint);
        out[9..13].copy_from_slice(&u32::from(self.child_number).to_be_bytes());
        out[13..45].copy_from_slice(&self.chain_code);
        match &self.key {
            KeyMaterial::Private(sk) => {
                out[45] = 0;
                out[46..78].copy_from_slice(&sk.secret_bytes());
            }
            KeyMaterial::Public(pk) => out[45..78].copy_from_slice(&pk.serialize()),
        }
        out
    }

    /// Parse the 78-byte payload (no checksum).
    pub fn from_bytes(data: &[u8]) -> Result<Self, KeyError> {
        if data.len() != XKEY_LEN {
            return Err(KeyError::MalformedKey(format!(
                "expected {XKEY_LEN} bytes, got {}",
                data.len()
            )));
        }
        let version_bytes = [data[0], data[1], data[2], data[3]];
        let version = KeyVersion::from_bytes(version_bytes).ok_or_else(|| {
            KeyError::MalformedKey(format!("unknown version {}", hex::encode(version_bytes)))
        })?;
        let depth = data[4];
        let parent_fingerprint = [data[5], data[6], data[7], data[8]];
        let child_number = ChildNumber::from(u32::from_be_bytes([data[9], data[10], data[11], data[12]]));
        if depth == 0 && (parent_fingerprint != [0u8; 4] || u32::from(child_number) != 0) {
            return Err(KeyError::MalformedKey(
                "depth 0 key with non-zero parent fingerprint or child number".into(),
            ));
        }
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);

        let key = match version.kind {
            KeyKind::Private => {
                if data[45] != 0 {
                    return Err(KeyError::MalformedKey(
                        "private key material must start with 0x00".into(),
                    ));
                }
                let sk = SecretKey::from_slice(&data[46..78])
                    .map_err(|_| KeyError::MalformedKey("private scalar out of range".into()))?;
                KeyMaterial::Private(sk)
            }
            KeyKind::Public => {
                if data[45] != 0x02 && data[45] != 0x03 {
                    return Err(KeyError::MalformedKey(
                        "public key material must be a compressed point".into(),
                    ));
                }
                let pk = PublicKey::from_slice(&data[45..78])
                    .map_err(|_| KeyError::MalformedKey("public key not on curve".into()))?;
                KeyMaterial::Public(pk)
            }
        };

        Ok(Self {
            network: version.network,
            script_type: version.script_type,
            depth,
            parent_fingerprint,
            child_number,
            chain_code,
            key,
        })
    }

    /// Base58check text form.
    pub fn encode(&self) -> String {
        let mut bytes = self.to_bytes();
        let s = base58::encode_check(&bytes);
        bytes.iter_mut().for_each(|b| *b = 0);
        s
    }

    /// Parse the base58check text form.
    pub fn decode(s: &str) -> Result<Self, KeyError> {
        let data = base58::decode_check(s.trim()).map_err(|e| KeyError::MalformedKey(e.to_string()))?;
        Self::from_bytes(&data)
    }

    /// Rewrite the version to `target`.
    ///
    /// Only the script type may change: a private key cannot become public
    /// (use [`neuter`](Self::neuter)), a public key cannot become private, and
    /// keys never move between networks.
    pub fn convert(&self, target: KeyVersion) -> Result<Self, KeyError> {
        let source = self.version();
        if source.kind != target.kind || source.network != target.network {
            return Err(KeyError::IncompatibleVariant {
                from: source.to_string(),
                to: target.to_string(),
            });
        }
        Ok(Self {
            script_type: target.script_type,
            ..self.clone()
        })
    }
}

/// Convert the text form of an extended key to another script type.
///
/// Keeps network and kind, so an xprv stays private and a tpub stays on
/// testnet.
pub fn convert_xkey(xkey: &str, script_type: ScriptType) -> Result<String, KeyError> {
    let key = ExtendedKey::decode(xkey)?;
    let target = KeyVersion::new(key.network(), script_type, key.kind());
    Ok(key.convert(target)?.encode())
}

impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ExtendedKey");
        d.field("version", &self.version())
            .field("depth", &self.depth)
            .field("parent_fingerprint", &hex::encode(self.parent_fingerprint))
            .field("child_number", &self.child_number);
        match &self.key {
            KeyMaterial::Public(_) => d.field("xpub", &self.encode()).finish(),
            KeyMaterial::Private(_) => d.field("key", &"[REDACTED]").finish(),
        }
    }
}

impl fmt::Display for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ExtendedKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for ExtendedKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for ExtendedKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

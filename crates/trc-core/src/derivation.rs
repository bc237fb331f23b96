//! Hierarchical deterministic key derivation (BIP-32).
//!
//! `derive_child` works on both private and public parents. For a
//! non-hardened index the two paths agree: the public projection of a
//! privately derived child equals the child derived from the public
//! projection of the parent. Hardened indices require a private parent.

use secp256k1::{PublicKey, Scalar, SecretKey, SECP256K1};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::{Network, ScriptType, HARDENED_OFFSET, MASTER_HMAC_KEY};
use crate::crypto::hmac_sha512;
use crate::error::{DerivationError, KeyError};
use crate::xkey::{ExtendedKey, KeyMaterial};

/// A single derivation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChildNumber {
    /// Index below 2^31.
    Normal(u32),
    /// Index below 2^31, offset by 2^31 on the wire.
    Hardened(u32),
}

impl ChildNumber {
    /// Non-hardened step; fails when `index` is not below 2^31.
    pub fn normal(index: u32) -> Result<Self, DerivationError> {
        if index >= HARDENED_OFFSET {
            return Err(DerivationError::InvalidPath(format!("index {index} out of range")));
        }
        Ok(Self::Normal(index))
    }

    /// Hardened step; fails when `index` is not below 2^31.
    pub fn hardened(index: u32) -> Result<Self, DerivationError> {
        if index >= HARDENED_OFFSET {
            return Err(DerivationError::InvalidPath(format!("index {index} out of range")));
        }
        Ok(Self::Hardened(index))
    }

    pub fn is_hardened(&self) -> bool {
        matches!(self, Self::Hardened(_))
    }

    /// Index without the hardened offset.
    pub fn index(&self) -> u32 {
        match self {
            Self::Normal(i) | Self::Hardened(i) => *i,
        }
    }
}

impl From<u32> for ChildNumber {
    fn from(raw: u32) -> Self {
        if raw >= HARDENED_OFFSET {
            Self::Hardened(raw - HARDENED_OFFSET)
        } else {
            Self::Normal(raw)
        }
    }
}

impl From<ChildNumber> for u32 {
    fn from(cn: ChildNumber) -> Self {
        match cn {
            ChildNumber::Normal(i) => i,
            ChildNumber::Hardened(i) => i | HARDENED_OFFSET,
        }
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal(i) => write!(f, "{i}"),
            Self::Hardened(i) => write!(f, "{i}'"),
        }
    }
}

impl FromStr for ChildNumber {
    type Err = DerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, hardened) = match s.strip_suffix('\'').or_else(|| s.strip_suffix('h')) {
            Some(d) => (d, true),
            None => (s, false),
        };
        let index: u32 = digits
            .parse()
            .map_err(|_| DerivationError::InvalidPath(format!("bad step {s:?}")))?;
        if hardened {
            Self::hardened(index)
        } else {
            Self::normal(index)
        }
    }
}

/// An ordered list of derivation steps, written `m/0'/1/2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    /// The empty path `m`.
    pub fn master() -> Self {
        Self(Vec::new())
    }

    pub fn steps(&self) -> &[ChildNumber] {
        &self.0
    }

    pub fn is_master(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path with `child` appended.
    pub fn child(&self, child: ChildNumber) -> Self {
        let mut steps = self.0.clone();
        steps.push(child);
        Self(steps)
    }
}

impl From<Vec<ChildNumber>> for DerivationPath {
    fn from(steps: Vec<ChildNumber>) -> Self {
        Self(steps)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for step in &self.0 {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = DerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        if parts.next() != Some("m") {
            return Err(DerivationError::InvalidPath(format!("{s:?} must start with m")));
        }
        let steps = parts
            .filter(|p| !p.is_empty())
            .map(ChildNumber::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(steps))
    }
}

impl Serialize for DerivationPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DerivationPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Master extended private key from a 16–64 byte seed.
pub fn master_from_seed(
    seed: &[u8],
    network: Network,
    script_type: ScriptType,
) -> Result<ExtendedKey, KeyError> {
    if !(16..=64).contains(&seed.len()) {
        return Err(DerivationError::InvalidSeedLength(seed.len()).into());
    }
    let mut i = hmac_sha512(MASTER_HMAC_KEY, seed);
    let result = SecretKey::from_slice(&i[..32]).map_err(|_| DerivationError::InvalidMasterKey);
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&i[32..]);
    i.iter_mut().for_each(|b| *b = 0);
    Ok(ExtendedKey::new(
        network,
        script_type,
        0,
        [0u8; 4],
        ChildNumber::Normal(0),
        chain_code,
        KeyMaterial::Private(result?),
    ))
}

/// Derive one child of `parent`.
pub fn derive_child(parent: &ExtendedKey, child: ChildNumber) -> Result<ExtendedKey, KeyError> {
    let raw = u32::from(child);
    let depth = parent
        .depth()
        .checked_add(1)
        .ok_or(DerivationError::DepthOverflow)?;
    let parent_pub = parent.public_key();

    let mut data = Vec::with_capacity(37);
    match (parent.key_material(), child.is_hardened()) {
        (KeyMaterial::Private(sk), true) => {
            data.push(0u8);
            data.extend_from_slice(&sk.secret_bytes());
        }
        (KeyMaterial::Public(_), true) => {
            return Err(DerivationError::HardenedFromPublic(child.index()).into());
        }
        (_, false) => data.extend_from_slice(&parent_pub.serialize()),
    }
    data.extend_from_slice(&raw.to_be_bytes());

    let mut i = hmac_sha512(parent.chain_code(), &data);
    data.iter_mut().for_each(|b| *b = 0);
    let mut il = [0u8; 32];
    il.copy_from_slice(&i[..32]);
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&i[32..]);
    i.iter_mut().for_each(|b| *b = 0);

    let tweak = Scalar::from_be_bytes(il).map_err(|_| DerivationError::InvalidChildKey(raw));
    il.iter_mut().for_each(|b| *b = 0);
    let tweak = tweak?;

    let key = match parent.key_material() {
        KeyMaterial::Private(sk) => KeyMaterial::Private(
            sk.add_tweak(&tweak)
                .map_err(|_| DerivationError::InvalidChildKey(raw))?,
        ),
        KeyMaterial::Public(pk) => KeyMaterial::Public(tweak_public(pk, &tweak, raw)?),
    };

    Ok(ExtendedKey::new(
        parent.network(),
        parent.script_type(),
        depth,
        parent.fingerprint(),
        child,
        chain_code,
        key,
    ))
}

fn tweak_public(pk: &PublicKey, tweak: &Scalar, raw: u32) -> Result<PublicKey, DerivationError> {
    pk.add_exp_tweak(SECP256K1, tweak)
        .map_err(|_| DerivationError::InvalidChildKey(raw))
}

/// Fold [`derive_child`] over every step of `path`.
pub fn derive_path(root: &ExtendedKey, path: &DerivationPath) -> Result<ExtendedKey, KeyError> {
    path.steps()
        .iter()
        .try_fold(root.clone(), |key, step| derive_child(&key, *step))
}

#[cfg(test)]
mod tests {
    use super::*;

    // BIP-32 test vector 1.
    const SEED_1: &str = "000102030405060708090a0b0c0d0e0f";

    fn master_1() -> ExtendedKey {
        master_from_seed(&hex::decode(SEED_1).unwrap(), Network::Mainnet, ScriptType::P2pkh).unwrap()
    }

    #[test]
    fn bip32_vector1_master() {
        let m = master_1();
        assert_eq!(
            m.encode(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        assert_eq!(
            m.neuter().encode(),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );
    }

    #[test]
    fn bip32_vector1_chain() {
        let path: DerivationPath = "m/0'/1/2'/2/1000000000".parse().unwrap();
        let key = derive_path(&master_1(), &path).unwrap();
        assert_eq!(
            key.encode(),
            "xprvA41z7zogVVwxVSgdKUHDy1SKmdb533PjDz7J6N6mV6uS3ze1ai8FHa8kmHScGpWmj4WggLyQjgPie1rFSruoUihUZREPSL39UNdE3BBDu76"
        );
        assert_eq!(
            key.neuter().encode(),
            "xpub6H1LXWLaKsWFhvm6RVpEL9P4KfRZSW7abD2ttkWP3SSQvnyA8FSVqNTEcYFgJS2UaFcxupHiYkro49S8yGasTvXEYBVPamhGW6cFJodrTHy"
        );
    }

    #[test]
    fn bip32_vector1_first_hardened_child() {
        let key = derive_child(&master_1(), ChildNumber::Hardened(0)).unwrap();
        assert_eq!(
            key.encode(),
            "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7"
        );
    }

    #[test]
    fn hardened_from_public_fails() {
        let xpub = master_1().neuter();
        let err = derive_child(&xpub, ChildNumber::Hardened(0)).unwrap_err();
        assert_eq!(err, KeyError::Derivation(DerivationError::HardenedFromPublic(0)));
    }

    #[test]
    fn public_and_private_derivation_agree() {
        let m = master_1();
        for i in [0u32, 1, 7, 1_000_000] {
            let child = ChildNumber::Normal(i);
            let via_private = derive_child(&m, child).unwrap().neuter();
            let via_public = derive_child(&m.neuter(), child).unwrap();
            assert_eq!(via_private, via_public, "mismatch at {i}");
        }
    }

    #[test]
    fn child_metadata() {
        let m = master_1();
        let child = derive_child(&m, ChildNumber::Normal(5)).unwrap();
        assert_eq!(child.depth(), 1);
        assert_eq!(child.parent_fingerprint(), m.fingerprint());
        assert_eq!(child.child_number(), ChildNumber::Normal(5));
        assert_eq!(hex::encode(m.fingerprint()), "3442193e");
    }

    #[test]
    fn derive_path_is_fold_of_children() {
        let m = master_1();
        let a = derive_path(&m, &"m/1/2".parse().unwrap()).unwrap();
        let b = derive_child(&derive_child(&m, ChildNumber::Normal(1)).unwrap(), ChildNumber::Normal(2)).unwrap();
        assert_eq!(a, b);
        assert_eq!(derive_path(&m, &DerivationPath::master()).unwrap(), m);
    }

    #[test]
    fn derive_path_from_public_with_hardened_step_fails() {
        let path: DerivationPath = "m/0/1'".parse().unwrap();
        assert!(derive_path(&master_1().neuter(), &path).is_err());
    }

    #[test]
    fn seed_length_bounds() {
        assert!(master_from_seed(&[0u8; 15], Network::Mainnet, ScriptType::P2pkh).is_err());
        assert!(master_from_seed(&[0u8; 65], Network::Mainnet, ScriptType::P2pkh).is_err());
        assert!(master_from_seed(&[1u8; 64], Network::Mainnet, ScriptType::P2pkh).is_ok());
    }

    #[test]
    fn script_type_and_network_inherited() {
        let m = master_from_seed(&[2u8; 32], Network::Testnet, ScriptType::P2wpkh).unwrap();
        let child = derive_child(&m, ChildNumber::Hardened(0)).unwrap();
        assert_eq!(child.network(), Network::Testnet);
        assert_eq!(child.script_type(), ScriptType::P2wpkh);
        assert!(child.neuter().encode().starts_with("vpub"));
    }

    #[test]
    fn child_number_raw_conversion() {
        assert_eq!(ChildNumber::from(5), ChildNumber::Normal(5));
        assert_eq!(ChildNumber::from(HARDENED_OFFSET + 3), ChildNumber::Hardened(3));
        assert_eq!(u32::from(ChildNumber::Hardened(3)), HARDENED_OFFSET + 3);
        assert!(ChildNumber::normal(HARDENED_OFFSET).is_err());
    }

    #[test]
    fn path_parse_and_display() {
        let path: DerivationPath = "m/44h/0'/0'/0/7".parse().unwrap();
        assert_eq!(path.to_string(), "m/44'/0'/0'/0/7");
        assert_eq!(path.steps().len(), 5);
        assert_eq!("m".parse::<DerivationPath>().unwrap(), DerivationPath::master());
        assert_eq!("m/".parse::<DerivationPath>().unwrap(), DerivationPath::master());
        assert!("44/0".parse::<DerivationPath>().is_err());
        assert!("m/x".parse::<DerivationPath>().is_err());
        assert!("m/2147483648".parse::<DerivationPath>().is_err());
    }

    #[test]
    fn path_child_appends() {
        let path = DerivationPath::master().child(ChildNumber::Hardened(0));
        assert_eq!(path.to_string(), "m/0'");
    }
}

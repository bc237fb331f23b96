//! Error types for the TRC key primitives.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Base58Error {
    #[error("invalid base58 character {character:?} at {index}")] InvalidCharacter { character: char, index: usize },
    #[error("checksum mismatch")] InvalidChecksum,
    #[error("payload too short for checksum")] NoChecksum,
    #[error("base58: {0}")] Other(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    #[error("hardened child {0} requested from a public-only parent")] HardenedFromPublic(u32),
    #[error("child key at index {0} is invalid")] InvalidChildKey(u32),
    #[error("maximum depth exceeded")] DepthOverflow,
    #[error("seed length {0} outside 16..=64 bytes")] InvalidSeedLength(usize),
    #[error("master key derived from seed is invalid")] InvalidMasterKey,
    #[error("invalid derivation path: {0}")] InvalidPath(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("malformed key: {0}")] MalformedKey(String),
    #[error("incompatible variant: cannot convert {from} to {to}")] IncompatibleVariant { from: String, to: String },
    #[error("derivation error: {0}")] Derivation(#[from] DerivationError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key")] InvalidPublicKey,
    #[error("invalid private key")] InvalidPrivateKey,
    #[error("unknown WIF prefix: {0:#04x}")] UnknownWifPrefix(u8),
    #[error("unknown script type: {0}")] UnknownScriptType(String),
    #[error(transparent)] Base58(#[from] Base58Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid length")] InvalidLength,
    #[error("invalid checksum")] InvalidChecksum,
    #[error("invalid character: {0}")] InvalidCharacter(char),
    #[error("invalid witness version: {0}")] InvalidWitnessVersion(u8),
    #[error("invalid padding bits")] InvalidPadding,
    #[error("unknown address prefix: {0:#04x}")] UnknownPrefix(u8),
    #[error("unknown human-readable part: {0}")] UnknownHrp(String),
    #[error("mixed case")] MixedCase,
    #[error("script type {0} has no single-key address")] UnsupportedScriptType(String),
    #[error(transparent)] Base58(#[from] Base58Error),
}

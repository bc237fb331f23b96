//! # trc-core
//! Key primitives for the TRC wallet: hashing, base58check, secp256k1 keys,
//! addresses, extended-key encoding and hierarchical derivation.

pub mod address;
pub mod base58;
pub mod constants;
pub mod crypto;
pub mod derivation;
pub mod error;
pub mod xkey;

pub use address::Address;
pub use constants::{Network, ScriptType};
pub use crypto::{PrivateKey, PublicKey};
pub use derivation::{ChildNumber, DerivationPath};
pub use error::{AddressError, CryptoError, DerivationError, KeyError};
pub use xkey::{ExtendedKey, KeyKind, KeyVersion};

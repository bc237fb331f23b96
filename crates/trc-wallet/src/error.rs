//! Wallet error types.

use thiserror::Error;
use trc_core::error::{AddressError, CryptoError, KeyError};

/// Errors that can occur in wallet operations.
///
/// `NoPrivateKey`, `AddressNotOwned`, `AddressNotInWallet` and
/// `UnknownAddress` are expected in normal use and let callers tell a wrong
/// address apart from a broken wallet. The storage variants are fatal to the
/// open or decrypt call that raised them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// The keystore holds only public material.
    #[error("keystore is watch-only and holds no private keys")]
    NoPrivateKey,

    /// Coordinates do not belong to this keystore.
    #[error("coordinates not owned by this keystore: {0}")]
    AddressNotOwned(String),

    /// The address was never derived or imported by this wallet.
    #[error("address not in wallet: {0}")]
    AddressNotInWallet(String),

    /// `mark_used` called with an address the pool never produced.
    #[error("unknown address: {0}")]
    UnknownAddress(String),

    /// Address pool and keystore disagree about ownership.
    #[error("address pool belongs to keystore {pool}, not {keystore}")]
    KeyStoreMismatch {
        /// Id recorded in the pool.
        pool: String,
        /// Id of the keystore passed in.
        keystore: String,
    },

    /// Authentication failed: wrong key, wrong passphrase, or tampering.
    #[error("decryption failed")]
    DecryptionFailed,

    /// Wallet file is corrupted or has invalid format.
    #[error("corrupted file: {0}")]
    CorruptFile(String),

    /// Wallet file was written by a newer schema.
    #[error("unsupported wallet schema version: {0}")]
    UnsupportedVersion(u32),

    /// Text that does not parse as an address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Seed phrase that is neither a valid electrum nor BIP-39 mnemonic.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Restore text that is not a seed, extended key, or key list.
    #[error("unrecognized wallet input: {0}")]
    UnrecognizedInput(String),

    /// Encryption failure.
    #[error("encryption: {0}")]
    Encryption(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization error.
    #[error("serialization: {0}")]
    Serialization(String),

    /// Extended-key error from trc-core.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Address error from trc-core.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Key-level cryptographic error from trc-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use trc_core::error::DerivationError;

    #[test]
    fn display_address_not_in_wallet() {
        let e = WalletError::AddressNotInWallet("1abc".into());
        assert_eq!(e.to_string(), "address not in wallet: 1abc");
    }

    #[test]
    fn display_unsupported_version() {
        assert_eq!(
            WalletError::UnsupportedVersion(9).to_string(),
            "unsupported wallet schema version: 9"
        );
    }

    #[test]
    fn display_keystore_mismatch() {
        let e = WalletError::KeyStoreMismatch {
            pool: "aa".into(),
            keystore: "bb".into(),
        };
        assert_eq!(e.to_string(), "address pool belongs to keystore aa, not bb");
    }

    #[test]
    fn clone_and_eq() {
        let e1 = WalletError::CorruptFile("bad magic".into());
        assert_eq!(e1.clone(), e1);
    }

    #[test]
    fn from_key_error() {
        let err: WalletError = KeyError::Derivation(DerivationError::HardenedFromPublic(0)).into();
        assert!(matches!(err, WalletError::Key(_)));
        assert!(err.to_string().contains("public-only parent"));
    }

    #[test]
    fn from_crypto_error() {
        let err: WalletError = CryptoError::InvalidPublicKey.into();
        assert_eq!(err, WalletError::Crypto(CryptoError::InvalidPublicKey));
    }
}

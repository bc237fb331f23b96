//! Passphrase encryption for wallet files.
//!
//! Argon2id stretches the passphrase into a 256-bit key; AES-256-GCM seals
//! the document body. Salt and Argon2 parameters travel in the clear file
//! header, which the caller binds to the body as associated data.
//!
//! # Sealed body
//! ```text
//! nonce (12 bytes) || ciphertext + auth_tag
//! ```

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::WalletError;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Minimum sealed size (nonce + auth tag).
const MIN_SEALED_LEN: usize = NONCE_LEN + 16;

/// Largest Argon2 memory cost accepted from a file header (1 GiB, in KiB).
pub const MAX_M_COST: u32 = 1 << 20;

/// Largest Argon2 pass count accepted from a file header.
pub const MAX_T_COST: u32 = 64;

/// Largest Argon2 parallelism accepted from a file header.
pub const MAX_P_COST: u32 = 16;

/// Argon2id cost parameters, stored alongside the salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Number of passes.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: Params::DEFAULT_M_COST,
            t_cost: Params::DEFAULT_T_COST,
            p_cost: Params::DEFAULT_P_COST,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests and throwaway wallets.
    pub fn light() -> Self {
        Self {
            m_cost: 64,
            t_cost: 1,
            p_cost: 1,
        }
    }

    /// Reject parameters beyond [`MAX_M_COST`], [`MAX_T_COST`] or
    /// [`MAX_P_COST`]. Checked before any key derivation.
    pub fn check_bounds(&self) -> Result<(), WalletError> {
        if self.m_cost > MAX_M_COST || self.t_cost > MAX_T_COST || self.p_cost > MAX_P_COST {
            return Err(WalletError::CorruptFile(format!(
                "kdf parameters out of range: m={} t={} p={}",
                self.m_cost, self.t_cost, self.p_cost
            )));
        }
        Ok(())
    }
}

/// Fresh random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

/// Stretch `passphrase` into a 256-bit key.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let argon_params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(32))
        .map_err(|e| WalletError::Encryption(format!("argon2 parameters: {e}")))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);
    let mut key = Zeroizing::new([0u8; 32]);
    argon
        .hash_password_into(passphrase, salt, key.as_mut_slice())
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    Ok(key)
}

/// Seal `plaintext` under `key` with a random nonce, authenticating `aad`.
pub fn seal(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, WalletError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| WalletError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Open a body produced by [`seal`] with the same `aad`.
///
/// A wrong key or any modification of the body or of `aad` fails with
/// [`WalletError::DecryptionFailed`].
pub fn open(key: &[u8; 32], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, WalletError> {
    if sealed.len() < MIN_SEALED_LEN {
        return Err(WalletError::CorruptFile(format!(
            "encrypted body too short: {} < {MIN_SEALED_LEN}",
            sealed.len()
        )));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| WalletError::Encryption(e.to_string()))?;
    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| WalletError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(pass: &[u8], salt: &[u8]) -> Zeroizing<[u8; 32]> {
        derive_key(pass, salt, &KdfParams::light()).unwrap()
    }

    #[test]
    fn seal_open_roundtrip() {
        let k = key(b"correct horse battery staple", &[1u8; SALT_LEN]);
        let sealed = seal(&k, b"secret wallet data", b"header").unwrap();
        assert_eq!(open(&k, &sealed, b"header").unwrap(), b"secret wallet data");
    }

    #[test]
    fn sealed_has_expected_overhead() {
        let k = key(b"pw", &[0u8; SALT_LEN]);
        let sealed = seal(&k, b"hello", b"").unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + 5 + 16);
    }

    #[test]
    fn wrong_passphrase_fails() {
        let salt = generate_salt();
        let sealed = seal(&key(b"correct", &salt), b"secret", b"").unwrap();
        let err = open(&key(b"wrong", &salt), &sealed, b"").unwrap_err();
        assert_eq!(err, WalletError::DecryptionFailed);
    }

    #[test]
    fn tampered_body_fails() {
        let k = key(b"pw", &[2u8; SALT_LEN]);
        let mut sealed = seal(&k, b"secret data", b"").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert_eq!(open(&k, &sealed, b""), Err(WalletError::DecryptionFailed));

        let mut sealed = seal(&k, b"secret data", b"").unwrap();
        sealed[0] ^= 0xFF;
        assert_eq!(open(&k, &sealed, b""), Err(WalletError::DecryptionFailed));
    }

    #[test]
    fn truncated_body_is_corrupt() {
        let k = key(b"pw", &[3u8; SALT_LEN]);
        assert!(matches!(open(&k, &[0u8; 10], b""), Err(WalletError::CorruptFile(_))));
    }

    #[test]
    fn associated_data_is_authenticated() {
        let k = key(b"pw", &[4u8; SALT_LEN]);
        let sealed = seal(&k, b"secret", br#"{"schema_version":2}"#).unwrap();
        assert_eq!(
            open(&k, &sealed, br#"{"schema_version":1}"#),
            Err(WalletError::DecryptionFailed)
        );
        assert_eq!(
            open(&k, &sealed, br#"{"schema_version":2}"#).unwrap(),
            b"secret"
        );
    }

    #[test]
    fn oversized_params_fail_bounds_check() {
        assert!(KdfParams::default().check_bounds().is_ok());
        assert!(KdfParams::light().check_bounds().is_ok());
        let huge = KdfParams {
            m_cost: u32::MAX,
            ..KdfParams::default()
        };
        assert!(matches!(huge.check_bounds(), Err(WalletError::CorruptFile(_))));
        let slow = KdfParams {
            t_cost: MAX_T_COST + 1,
            ..KdfParams::default()
        };
        assert!(slow.check_bounds().is_err());
    }

    #[test]
    fn derive_key_depends_on_all_inputs() {
        let base = key(b"password", b"salt-salt-salt-1");
        assert_eq!(*base, *key(b"password", b"salt-salt-salt-1"));
        assert_ne!(*base, *key(b"password2", b"salt-salt-salt-1"));
        assert_ne!(*base, *key(b"password", b"salt-salt-salt-2"));
        let heavier = derive_key(
            b"password",
            b"salt-salt-salt-1",
            &KdfParams {
                t_cost: 2,
                ..KdfParams::light()
            },
        )
        .unwrap();
        assert_ne!(*base, *heavier);
    }

    #[test]
    fn invalid_params_rejected() {
        let bad = KdfParams {
            m_cost: 0,
            t_cost: 0,
            p_cost: 0,
        };
        assert!(matches!(
            derive_key(b"pw", &[0u8; SALT_LEN], &bad),
            Err(WalletError::Encryption(_))
        ));
    }

    #[test]
    fn default_params_match_argon2_defaults() {
        let p = KdfParams::default();
        assert_eq!(p.m_cost, Params::DEFAULT_M_COST);
        assert_eq!(p.t_cost, Params::DEFAULT_T_COST);
    }
}

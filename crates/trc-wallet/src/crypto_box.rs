//! Public-key message encryption bound to wallet keys.
//!
//! ECIES over secp256k1: a fresh ephemeral key agrees a point with the
//! recipient, HKDF-SHA256 turns it into an AES-256-GCM key.
//!
//! # Wire format
//! ```text
//! "TRE1" (4) || ephemeral_pub (33) || nonce (12) || ciphertext + tag
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use secp256k1::{Scalar, SecretKey, SECP256K1};
use sha2::Sha256;
use zeroize::Zeroizing;

use trc_core::crypto::{public_key_from_hex, PrivateKey, PublicKey};

use crate::error::WalletError;

/// Format tag at the start of every box.
pub const MAGIC: &[u8; 4] = b"TRE1";

/// HKDF info label.
const HKDF_INFO: &[u8] = b"trc-wallet-cryptobox-v1";

const PUBKEY_LEN: usize = 33;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Smallest well-formed box (empty plaintext).
const MIN_BOX_LEN: usize = MAGIC.len() + PUBKEY_LEN + NONCE_LEN + TAG_LEN;

fn shared_key(
    point: &PublicKey,
    ephemeral: &PublicKey,
    recipient: &PublicKey,
) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let shared = Zeroizing::new(point.serialize());
    let mut salt = Vec::with_capacity(2 * PUBKEY_LEN);
    salt.extend_from_slice(&ephemeral.serialize());
    salt.extend_from_slice(&recipient.serialize());

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared.as_slice());
    let mut key = Zeroizing::new([0u8; 32]);
    hk.expand(HKDF_INFO, key.as_mut_slice())
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    Ok(key)
}

/// Encrypt `plaintext` to `recipient`.
pub fn encrypt(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, WalletError> {
    let mut ephemeral_secret = SecretKey::new(&mut rand::rngs::OsRng);
    let ephemeral = PublicKey::from_secret_key(SECP256K1, &ephemeral_secret);
    let point = recipient
        .mul_tweak(SECP256K1, &Scalar::from(ephemeral_secret))
        .map_err(|e| WalletError::Encryption(e.to_string()));
    ephemeral_secret.non_secure_erase();
    let key = shared_key(&point?, &ephemeral, recipient)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(MIN_BOX_LEN + plaintext.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&ephemeral.serialize());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a box with the recipient's private key.
///
/// Any malformed, tampered, or misaddressed box fails with
/// [`WalletError::DecryptionFailed`]; no plaintext escapes before the tag
/// is verified.
pub fn decrypt(key: &PrivateKey, data: &[u8]) -> Result<Vec<u8>, WalletError> {
    if data.len() < MIN_BOX_LEN || &data[..MAGIC.len()] != MAGIC {
        return Err(WalletError::DecryptionFailed);
    }
    let rest = &data[MAGIC.len()..];
    let ephemeral =
        PublicKey::from_slice(&rest[..PUBKEY_LEN]).map_err(|_| WalletError::DecryptionFailed)?;
    let nonce_bytes = &rest[PUBKEY_LEN..PUBKEY_LEN + NONCE_LEN];
    let ciphertext = &rest[PUBKEY_LEN + NONCE_LEN..];

    let point = ephemeral
        .mul_tweak(SECP256K1, &Scalar::from(*key.secret_key()))
        .map_err(|_| WalletError::DecryptionFailed)?;
    let sym = shared_key(&point, &ephemeral, &key.public_key())?;
    let cipher = Aes256Gcm::new_from_slice(sym.as_slice())
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| WalletError::DecryptionFailed)
}

/// Encrypt a text message to a hex public key; returns base64.
pub fn encrypt_message(pubkey_hex: &str, message: &str) -> Result<String, WalletError> {
    let recipient = public_key_from_hex(pubkey_hex)?;
    Ok(STANDARD.encode(encrypt(&recipient, message.as_bytes())?))
}

/// Decrypt a base64 message produced by [`encrypt_message`].
pub fn decrypt_message(key: &PrivateKey, encoded: &str) -> Result<String, WalletError> {
    let data = STANDARD
        .decode(encoded.trim())
        .map_err(|_| WalletError::DecryptionFailed)?;
    let plaintext = decrypt(key, &data)?;
    String::from_utf8(plaintext).map_err(|_| WalletError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trc_core::constants::Network;

    const WIF: &str = "L4rYY5QpfN6wJEF4SEKDpcGhTPnCe9zcGs6hiSnhpprZqVywFifN";
    const PUBKEY_HEX: &str = "021f110909ded653828a254515b58498a6bafc96799fb0851554463ed44ca7d9da";

    fn key() -> PrivateKey {
        PrivateKey::from_wif(WIF).unwrap()
    }

    #[test]
    fn roundtrip() {
        let boxed = encrypt(&key().public_key(), b"hello world").unwrap();
        assert_eq!(&boxed[..4], MAGIC);
        assert_eq!(boxed.len(), MIN_BOX_LEN + 11);
        assert_eq!(decrypt(&key(), &boxed).unwrap(), b"hello world");
    }

    #[test]
    fn empty_plaintext() {
        let boxed = encrypt(&key().public_key(), b"").unwrap();
        assert_eq!(boxed.len(), MIN_BOX_LEN);
        assert!(decrypt(&key(), &boxed).unwrap().is_empty());
    }

    #[test]
    fn fresh_ephemeral_per_call() {
        let a = encrypt(&key().public_key(), b"same").unwrap();
        let b = encrypt(&key().public_key(), b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let other = PrivateKey::generate(Network::Mainnet);
        let boxed = encrypt(&key().public_key(), b"secret").unwrap();
        assert_eq!(decrypt(&other, &boxed), Err(WalletError::DecryptionFailed));
    }

    #[test]
    fn tampering_detected_everywhere() {
        let boxed = encrypt(&key().public_key(), b"secret").unwrap();
        for position in [0, 5, MAGIC.len() + PUBKEY_LEN, boxed.len() - 1] {
            let mut bad = boxed.clone();
            bad[position] ^= 0x01;
            assert_eq!(
                decrypt(&key(), &bad),
                Err(WalletError::DecryptionFailed),
                "flip at {position}"
            );
        }
    }

    #[test]
    fn truncated_fails() {
        assert_eq!(decrypt(&key(), b"TRE1"), Err(WalletError::DecryptionFailed));
    }

    #[test]
    fn text_transport() {
        let encoded = encrypt_message(PUBKEY_HEX, "asdasd").unwrap();
        assert_eq!(decrypt_message(&key(), &encoded).unwrap(), "asdasd");
    }

    #[test]
    fn bad_pubkey_hex_rejected() {
        assert!(matches!(
            encrypt_message("zz", "msg"),
            Err(WalletError::Crypto(_))
        ));
    }

    #[test]
    fn bad_base64_fails() {
        assert_eq!(
            decrypt_message(&key(), "not base64!!"),
            Err(WalletError::DecryptionFailed)
        );
    }
}

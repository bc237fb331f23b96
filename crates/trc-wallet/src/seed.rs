//! Mnemonic seeds: electrum-style versioned seeds and BIP-39.
//!
//! An electrum seed carries its own version: the hex HMAC-SHA512 of the
//! normalized phrase keyed with `"Seed version"` starts with a fixed prefix
//! (`01` standard, `100` segwit). The phrase is stretched with
//! PBKDF2-HMAC-SHA512 (2048 rounds, salt `"electrum" + passphrase`) into a
//! 64-byte BIP-32 seed. Both wordlists are the BIP-39 English list.

use bip39::{Language, Mnemonic};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha512;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use trc_core::constants::{HARDENED_OFFSET, ScriptType};
use trc_core::crypto::hmac_sha512;
use trc_core::derivation::{ChildNumber, DerivationPath};

use crate::error::WalletError;

/// PBKDF2 rounds used to stretch a mnemonic.
const PBKDF2_ROUNDS: u32 = 2048;

/// Salt prefix for electrum seeds.
const ELECTRUM_SALT_PREFIX: &str = "electrum";

/// Bits of entropy in a generated seed (12 words of 11 bits).
const GENERATED_SEED_BITS: u32 = 132;

/// Version of an electrum seed phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedType {
    Standard,
    Segwit,
}

impl SeedType {
    /// Required hex prefix of `HMAC-SHA512("Seed version", phrase)`.
    pub fn version_prefix(&self) -> &'static str {
        match self {
            Self::Standard => "01",
            Self::Segwit => "100",
        }
    }

    /// Script type of the keystore this seed creates.
    pub fn script_type(&self) -> ScriptType {
        match self {
            Self::Standard => ScriptType::P2pkh,
            Self::Segwit => ScriptType::P2wpkh,
        }
    }

    /// Account path relative to the master key.
    pub fn account_path(&self) -> DerivationPath {
        match self {
            Self::Standard => DerivationPath::master(),
            Self::Segwit => DerivationPath::master().child(ChildNumber::Hardened(0)),
        }
    }
}

/// Lowercase and collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether `phrase` is an electrum seed of the given version.
pub fn is_new_seed(phrase: &str, seed_type: SeedType) -> bool {
    let normalized = normalize_text(phrase);
    let mac = hmac_sha512(b"Seed version", normalized.as_bytes());
    hex::encode(mac).starts_with(seed_type.version_prefix())
}

/// Detect the electrum seed version of `phrase`, if any.
pub fn seed_type(phrase: &str) -> Option<SeedType> {
    [SeedType::Standard, SeedType::Segwit]
        .into_iter()
        .find(|t| is_new_seed(phrase, *t))
}

/// Whether `phrase` parses as a BIP-39 mnemonic (checksum included).
pub fn is_bip39_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_in(Language::English, normalize_text(phrase).as_str()).is_ok()
}

/// A 64-byte BIP-32 seed.
///
/// Secret material is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 64],
}

impl Seed {
    /// Create a seed from raw bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Stretch an electrum seed phrase.
    ///
    /// Fails when the phrase carries no recognised seed version.
    pub fn from_electrum_mnemonic(
        phrase: &str,
        passphrase: &str,
    ) -> Result<(Self, SeedType), WalletError> {
        let kind = seed_type(phrase)
            .ok_or_else(|| WalletError::InvalidMnemonic("not an electrum seed".into()))?;
        let mut bytes = [0u8; 64];
        let mut salt = format!("{ELECTRUM_SALT_PREFIX}{}", normalize_text(passphrase));
        pbkdf2_hmac::<Sha512>(
            normalize_text(phrase).as_bytes(),
            salt.as_bytes(),
            PBKDF2_ROUNDS,
            &mut bytes,
        );
        salt.zeroize();
        Ok((Self { bytes }, kind))
    }

    /// Stretch a BIP-39 mnemonic.
    pub fn from_bip39_mnemonic(phrase: &str, passphrase: &str) -> Result<Self, WalletError> {
        let normalized = normalize_text(phrase);
        let m = Mnemonic::parse_in(Language::English, normalized.as_str())
            .map_err(|e| WalletError::InvalidMnemonic(e.to_string()))?;
        Ok(Self {
            bytes: m.to_seed_normalized(passphrase),
        })
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh 12-word electrum seed of the given version.
///
/// Draws random entropy with the top word non-zero, then increments a nonce
/// until the phrase carries the requested version prefix.
pub fn generate_mnemonic(seed_type: SeedType) -> String {
    let wordlist = Language::English.word_list();
    let top_bits = GENERATED_SEED_BITS - 128;
    loop {
        let mut buf = [0u8; 17];
        rand::rngs::OsRng.fill_bytes(&mut buf);
        let hi = buf[0] & ((1 << top_bits) - 1);
        let mut lo_bytes = [0u8; 16];
        lo_bytes.copy_from_slice(&buf[1..]);
        let lo = u128::from_be_bytes(lo_bytes);
        buf.zeroize();
        lo_bytes.zeroize();

        // Entropy below 2^121 would encode to fewer than 12 words.
        if word_at(hi, lo, 11) == 0 {
            continue;
        }

        let mut nonce: u128 = 0;
        while nonce < u128::from(HARDENED_OFFSET) {
            nonce += 1;
            let (sum, carry) = lo.overflowing_add(nonce);
            let sum_hi = hi + u8::from(carry);
            if sum_hi >> top_bits != 0 {
                break;
            }
            let phrase = (0..12)
                .map(|k| wordlist[word_at(sum_hi, sum, k) as usize])
                .collect::<Vec<_>>()
                .join(" ");
            if is_new_seed(&phrase, seed_type) {
                return phrase;
            }
        }
    }
}

/// The `k`-th 11-bit group, counted from the least significant end.
fn word_at(hi: u8, lo: u128, k: u32) -> u16 {
    let start = 11 * k;
    let window = if start + 11 <= 128 {
        lo >> start
    } else {
        (lo >> start) | (u128::from(hi) << (128 - start))
    };
    (window & 0x7ff) as u16
}

//! Address encoding.
//!
//! Legacy addresses (P2PKH, P2SH) use base58check with a network prefix byte.
//! Segwit addresses use Bech32 ([BIP-173]) for witness version 0 and Bech32m
//! ([BIP-350]) for later versions, with a network human-readable part.
//!
//! [BIP-173]: https://github.com/bitcoin/bips/blob/master/bip-0173.mediawiki
//! [BIP-350]: https://github.com/bitcoin/bips/blob/master/bip-0350.mediawiki

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::base58;
use crate::constants::{Network, ScriptType};
use crate::crypto::{hash160, PublicKey};
use crate::error::AddressError;

/// Bech32 checksum constant (BIP-173).
const BECH32_CONST: u32 = 1;

/// Bech32m checksum constant (BIP-350).
const BECH32M_CONST: u32 = 0x2bc830a3;

/// Bech32 character set for encoding 5-bit values.
const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// What an address pays to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Payload {
    PubkeyHash([u8; 20]),
    ScriptHash([u8; 20]),
    WitnessProgram { version: u8, program: Vec<u8> },
}

/// A network address.
///
/// Equality and hashing follow the decoded payload, so two spellings of the
/// same bech32 address (upper/lower case) compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    payload: Payload,
}

impl Address {
    pub fn new(payload: Payload, network: Network) -> Self {
        Self { network, payload }
    }

    /// Address of a single public key under the given script type.
    pub fn from_public_key(
        public_key: &PublicKey,
        script_type: ScriptType,
        network: Network,
    ) -> Result<Self, AddressError> {
        let pkh = hash160(&public_key.serialize());
        let payload = match script_type {
            ScriptType::P2pkh => Payload::PubkeyHash(pkh),
            ScriptType::P2wpkhP2sh => {
                let mut redeem = Vec::with_capacity(22);
                redeem.extend_from_slice(&[0x00, 0x14]);
                redeem.extend_from_slice(&pkh);
                Payload::ScriptHash(hash160(&redeem))
            }
            ScriptType::P2wpkh => Payload::WitnessProgram {
                version: 0,
                program: pkh.to_vec(),
            },
            other => return Err(AddressError::UnsupportedScriptType(other.to_string())),
        };
        Ok(Self::new(payload, network))
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Encode as base58check or bech32 text.
    pub fn encode(&self) -> String {
        match &self.payload {
            Payload::PubkeyHash(hash) => legacy_encode(self.network.p2pkh_prefix(), hash),
            Payload::ScriptHash(hash) => legacy_encode(self.network.p2sh_prefix(), hash),
            Payload::WitnessProgram { version, program } => {
                segwit_encode(self.network.bech32_hrp(), *version, program)
            }
        }
    }

    /// Decode any supported address form, detecting the network.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        let lower = s.to_ascii_lowercase();
        for network in Network::ALL {
            let hrp = network.bech32_hrp();
            if lower.len() > hrp.len() && lower.starts_with(hrp) && lower.as_bytes()[hrp.len()] == b'1' {
                let (version, program) = segwit_decode(s, hrp)?;
                return Ok(Self::new(Payload::WitnessProgram { version, program }, network));
            }
        }

        let data = base58::decode_check(s)?;
        if data.len() != 21 {
            return Err(AddressError::InvalidLength);
        }
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&data[1..]);
        let prefix = data[0];
        for network in Network::ALL {
            if prefix == network.p2pkh_prefix() {
                return Ok(Self::new(Payload::PubkeyHash(hash), network));
            }
            if prefix == network.p2sh_prefix() {
                return Ok(Self::new(Payload::ScriptHash(hash), network));
            }
        }
        Err(AddressError::UnknownPrefix(prefix))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

fn legacy_encode(prefix: u8, hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(prefix);
    payload.extend_from_slice(hash);
    base58::encode_check(&payload)
}

fn segwit_encode(hrp: &str, version: u8, program: &[u8]) -> String {
    let data_5bit = convert_bits(program, 8, 5, true).unwrap_or_default();
    let mut payload = Vec::with_capacity(1 + data_5bit.len());
    payload.push(version);
    payload.extend_from_slice(&data_5bit);

    let constant = if version == 0 { BECH32_CONST } else { BECH32M_CONST };
    let checksum = bech32_create_checksum(hrp, &payload, constant);

    let mut result = String::with_capacity(hrp.len() + 1 + payload.len() + 6);
    result.push_str(hrp);
    result.push('1');
    for &d in payload.iter().chain(checksum.iter()) {
        result.push(CHARSET[d as usize] as char);
    }
    result
}

fn segwit_decode(s: &str, expected_hrp: &str) -> Result<(u8, Vec<u8>), AddressError> {
    let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = s.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(AddressError::MixedCase);
    }
    let s_lower = s.to_ascii_lowercase();
    let sep_pos = s_lower.rfind('1').ok_or(AddressError::InvalidLength)?;
    let hrp = &s_lower[..sep_pos];
    if hrp != expected_hrp {
        return Err(AddressError::UnknownHrp(hrp.to_string()));
    }
    let data_part = &s_lower[sep_pos + 1..];
    if data_part.len() < 7 || s_lower.len() > 90 {
        return Err(AddressError::InvalidLength);
    }

    let mut data = Vec::with_capacity(data_part.len());
    for c in data_part.chars() {
        let pos = CHARSET
            .iter()
            .position(|&ch| ch as char == c)
            .ok_or(AddressError::InvalidCharacter(c))?;
        data.push(pos as u8);
    }

    let version = data[0];
    if version > 16 {
        return Err(AddressError::InvalidWitnessVersion(version));
    }
    let constant = if version == 0 { BECH32_CONST } else { BECH32M_CONST };
    if bech32_polymod_with_hrp(hrp, &data) != constant {
        return Err(AddressError::InvalidChecksum);
    }

    let payload = &data[1..data.len() - 6];
    let program = convert_bits(payload, 5, 8, false).ok_or(AddressError::InvalidPadding)?;
    if program.len() < 2 || program.len() > 40 {
        return Err(AddressError::InvalidLength);
    }
    if version == 0 && program.len() != 20 && program.len() != 32 {
        return Err(AddressError::InvalidLength);
    }
    Ok((version, program))
}

// --- Bech32 internals ---

/// Compute the Bech32 polymod over a sequence of 5-bit values.
fn bech32_polymod(values: &[u8]) -> u32 {
    const GEN: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];
    let mut chk: u32 = 1;
    for &v in values {
        let b = chk >> 25;
        chk = ((chk & 0x1ffffff) << 5) ^ (v as u32);
        for (i, &g) in GEN.iter().enumerate() {
            if (b >> i) & 1 != 0 {
                chk ^= g;
            }
        }
    }
    chk
}

/// Expand the HRP for checksum computation.
fn bech32_hrp_expand(hrp: &str) -> Vec<u8> {
    let mut ret = Vec::with_capacity(hrp.len() * 2 + 1);
    for c in hrp.bytes() {
        ret.push(c >> 5);
    }
    ret.push(0);
    for c in hrp.bytes() {
        ret.push(c & 31);
    }
    ret
}

fn bech32_polymod_with_hrp(hrp: &str, data: &[u8]) -> u32 {
    let mut values = bech32_hrp_expand(hrp);
    values.extend_from_slice(data);
    bech32_polymod(&values)
}

/// Create the 6-value checksum for the given HRP, data and constant.
fn bech32_create_checksum(hrp: &str, data: &[u8], constant: u32) -> Vec<u8> {
    let mut values = bech32_hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
    let polymod = bech32_polymod(&values) ^ constant;
    (0..6)
        .map(|i| ((polymod >> (5 * (5 - i))) & 31) as u8)
        .collect()
}

/// Convert between bit widths (e.g. 8-bit bytes to 5-bit Bech32 groups).
fn convert_bits(data: &[u8], from_bits: u32, to_bits: u32, pad: bool) -> Option<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut ret = Vec::new();
    let maxv = (1u32 << to_bits) - 1;
    for &value in data {
        let v = value as u32;
        if v >> from_bits != 0 {
            return None;
        }
        acc = (acc << from_bits) | v;
        bits += from_bits;
        while bits >= to_bits {
            bits -= to_bits;
            ret.push(((acc >> bits) & maxv) as u8);
        }
    }
    if pad {
        if bits > 0 {
            ret.push(((acc << (to_bits - bits)) & maxv) as u8);
        }
    } else if bits >= from_bits || ((acc << (to_bits - bits)) & maxv) != 0 {
        return None;
    }
    Some(ret)
}

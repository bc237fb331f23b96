//! Network parameters and script-type tables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CryptoError;

/// Offset of the first hardened child index (2^31).
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Default number of trailing unused receiving addresses.
pub const DEFAULT_GAP_LIMIT: u32 = 20;

/// Default number of trailing unused change addresses.
pub const DEFAULT_CHANGE_GAP_LIMIT: u32 = 6;

/// HMAC key used to derive a BIP-32 master key from a seed.
pub const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

/// Length of a serialized extended key without checksum.
pub const XKEY_LEN: usize = 78;

/// Network a key or address belongs to.
///
/// Controls base58 prefixes, WIF prefix, bech32 human-readable part and the
/// extended-key version table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
}

impl Network {
    /// Base58 prefix of pay-to-pubkey-hash addresses.
    pub fn p2pkh_prefix(&self) -> u8 {
        match self {
            Self::Mainnet => 0x00,
            Self::Testnet => 0x6f,
        }
    }

    /// Base58 prefix of pay-to-script-hash addresses.
    pub fn p2sh_prefix(&self) -> u8 {
        match self {
            Self::Mainnet => 0x05,
            Self::Testnet => 0xc4,
        }
    }

    /// Prefix byte of WIF-encoded private keys.
    pub fn wif_prefix(&self) -> u8 {
        match self {
            Self::Mainnet => 0x80,
            Self::Testnet => 0xef,
        }
    }

    /// Bech32 human-readable part for segwit addresses.
    pub fn bech32_hrp(&self) -> &'static str {
        match self {
            Self::Mainnet => "bc",
            Self::Testnet => "tb",
        }
    }

    pub const ALL: [Network; 2] = [Network::Mainnet, Network::Testnet];
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => f.write_str("mainnet"),
            Self::Testnet => f.write_str("testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "testnet" | "test" => Ok(Self::Testnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Output script family a key is used with.
///
/// Text names follow the wallet's historical spelling (`standard` for
/// pay-to-pubkey-hash). The two `p2wsh` variants only exist as extended-key
/// version tags; they have no single-key address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScriptType {
    #[default]
    #[serde(rename = "standard")]
    P2pkh,
    #[serde(rename = "p2wpkh-p2sh")]
    P2wpkhP2sh,
    #[serde(rename = "p2wsh-p2sh")]
    P2wshP2sh,
    #[serde(rename = "p2wpkh")]
    P2wpkh,
    #[serde(rename = "p2wsh")]
    P2wsh,
}

impl ScriptType {
    pub const ALL: [ScriptType; 5] = [
        ScriptType::P2pkh,
        ScriptType::P2wpkhP2sh,
        ScriptType::P2wshP2sh,
        ScriptType::P2wpkh,
        ScriptType::P2wsh,
    ];

    /// Name used for extended-key variants (`standard`, `p2wpkh`, ...).
    pub fn xtype_name(&self) -> &'static str {
        match self {
            Self::P2pkh => "standard",
            Self::P2wpkhP2sh => "p2wpkh-p2sh",
            Self::P2wshP2sh => "p2wsh-p2sh",
            Self::P2wpkh => "p2wpkh",
            Self::P2wsh => "p2wsh",
        }
    }

    /// Prefix used when exporting a private key (`p2pkh:<WIF>`).
    pub fn wif_label(&self) -> &'static str {
        match self {
            Self::P2pkh => "p2pkh",
            other => other.xtype_name(),
        }
    }

    /// Parse either the extended-key name or the WIF label.
    pub fn from_label(s: &str) -> Result<Self, CryptoError> {
        match s {
            "standard" | "p2pkh" => Ok(Self::P2pkh),
            "p2wpkh-p2sh" => Ok(Self::P2wpkhP2sh),
            "p2wsh-p2sh" => Ok(Self::P2wshP2sh),
            "p2wpkh" => Ok(Self::P2wpkh),
            "p2wsh" => Ok(Self::P2wsh),
            other => Err(CryptoError::UnknownScriptType(other.to_string())),
        }
    }

    /// Whether a single public key maps to an address of this type.
    pub fn is_single_key(&self) -> bool {
        matches!(self, Self::P2pkh | Self::P2wpkhP2sh | Self::P2wpkh)
    }

    /// Extended-key version bytes `(private, public)` for a network.
    pub fn xkey_versions(&self, network: Network) -> ([u8; 4], [u8; 4]) {
        match (network, self) {
            (Network::Mainnet, Self::P2pkh) => ([0x04, 0x88, 0xad, 0xe4], [0x04, 0x88, 0xb2, 0x1e]),
            (Network::Mainnet, Self::P2wpkhP2sh) => ([0x04, 0x9d, 0x78, 0x78], [0x04, 0x9d, 0x7c, 0xb2]),
            (Network::Mainnet, Self::P2wshP2sh) => ([0x02, 0x95, 0xb0, 0x05], [0x02, 0x95, 0xb4, 0x3f]),
            (Network::Mainnet, Self::P2wpkh) => ([0x04, 0xb2, 0x43, 0x0c], [0x04, 0xb2, 0x47, 0x46]),
            (Network::Mainnet, Self::P2wsh) => ([0x02, 0xaa, 0x7a, 0x99], [0x02, 0xaa, 0x7e, 0xd3]),
            (Network::Testnet, Self::P2pkh) => ([0x04, 0x35, 0x83, 0x94], [0x04, 0x35, 0x87, 0xcf]),
            (Network::Testnet, Self::P2wpkhP2sh) => ([0x04, 0x4a, 0x4e, 0x28], [0x04, 0x4a, 0x52, 0x62]),
            (Network::Testnet, Self::P2wshP2sh) => ([0x02, 0x42, 0x85, 0xb5], [0x02, 0x42, 0x89, 0xef]),
            (Network::Testnet, Self::P2wpkh) => ([0x04, 0x5f, 0x18, 0xbc], [0x04, 0x5f, 0x1c, 0xf6]),
            (Network::Testnet, Self::P2wsh) => ([0x02, 0x57, 0x50, 0x48], [0x02, 0x57, 0x54, 0x83]),
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.xtype_name())
    }
}

impl FromStr for ScriptType {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
    }
}

//! Wallet configuration.

use serde::{Deserialize, Serialize};

use trc_core::constants::{Network, DEFAULT_CHANGE_GAP_LIMIT, DEFAULT_GAP_LIMIT};

use crate::address_pool::GapLimits;
use crate::encryption::KdfParams;

/// Configuration for creating and opening wallets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Network keys and addresses are encoded for.
    pub network: Network,
    /// Unused receiving addresses kept ahead of the last used one.
    pub gap_limit: u32,
    /// Unused change addresses kept ahead of the last used one.
    pub change_gap_limit: u32,
    /// Argon2 parameters for newly encrypted files.
    pub kdf: KdfParams,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            gap_limit: DEFAULT_GAP_LIMIT,
            change_gap_limit: DEFAULT_CHANGE_GAP_LIMIT,
            kdf: KdfParams::default(),
        }
    }
}

impl WalletConfig {
    pub fn mainnet() -> Self {
        Self::default()
    }

    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            ..Self::default()
        }
    }

    pub fn gap_limits(&self) -> GapLimits {
        GapLimits {
            receiving: self.gap_limit,
            change: self.change_gap_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_mainnet_with_standard_gaps() {
        let cfg = WalletConfig::default();
        assert_eq!(cfg.network, Network::Mainnet);
        assert_eq!(cfg.gap_limits(), GapLimits::default());
    }

    #[test]
    fn testnet_preset_only_changes_network() {
        let cfg = WalletConfig::testnet();
        assert_eq!(cfg.network, Network::Testnet);
        assert_eq!(cfg.gap_limit, WalletConfig::mainnet().gap_limit);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = WalletConfig {
            gap_limit: 50,
            kdf: KdfParams::light(),
            ..WalletConfig::testnet()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"testnet\""));
        let back: WalletConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}

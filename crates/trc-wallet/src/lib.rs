//! # trc-wallet: key stores, address pool and encrypted wallet storage.
//!
//! Builds on the primitives in `trc-core` to turn a seed, an extended key
//! or a set of imported keys into a wallet that knows its addresses, keeps a
//! gap-limit lookahead, exports keys by address and persists itself
//! atomically behind a passphrase.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum
//! - [`seed`]: electrum and BIP-39 mnemonics
//! - [`keystore`]: deterministic and imported key stores
//! - [`address_pool`]: gap-limit address tracking
//! - [`crypto_box`]: ECIES message encryption to wallet keys
//! - [`encryption`]: Argon2id + AES-256-GCM for wallet files
//! - [`document`]: versioned wallet document and migrations
//! - [`storage`]: file format and atomic storage ports
//! - [`config`]: `WalletConfig`
//! - [`wallet`]: high-level wallet composition

pub mod address_pool;
pub mod config;
pub mod crypto_box;
pub mod document;
pub mod encryption;
pub mod error;
pub mod keystore;
pub mod seed;
pub mod storage;
pub mod wallet;

// Re-exports for convenient access
pub use address_pool::{AddressPool, GapLimits, PoolEntry, PoolSnapshot};
pub use config::WalletConfig;
pub use document::{WalletDocument, WalletMetadata, CURRENT_SCHEMA_VERSION};
pub use encryption::KdfParams;
pub use error::WalletError;
pub use keystore::{Branch, Capability, Coordinates, KeyStore, KeyStoreData};
pub use seed::{Seed, SeedType};
pub use storage::{FileStore, MemoryStore, StoragePort, WalletStorage};
pub use wallet::{Wallet, WalletHandle};

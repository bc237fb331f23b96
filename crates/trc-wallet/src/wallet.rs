//! Wallet composition: key store, address pool and storage.
//!
//! The [`Wallet`] owns exactly one key store and the address pool built on
//! it. Usage reported by the network layer flows in through
//! [`Wallet::mark_used`]; private keys flow out only for addresses the pool
//! has materialized.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

use trc_core::constants::ScriptType;
use trc_core::crypto::{public_key_from_hex, PrivateKey};
use trc_core::derivation::DerivationPath;
use trc_core::xkey::{ExtendedKey, KeyKind};
use trc_core::error::Base58Error;
use trc_core::{Address, AddressError};

use crate::address_pool::{AddressPool, GapLimits, PoolSnapshot};
use crate::config::WalletConfig;
use crate::crypto_box;
use crate::document::{self, WalletDocument, WalletMetadata};
use crate::error::WalletError;
use crate::keystore::{
    Branch, Capability, Coordinates, DeterministicKeyStore, ImportedKeyStore, KeyStore,
    KeyStoreData,
};
use crate::seed::{self, Seed, SeedType};
use crate::storage::WalletStorage;

/// A key store, its address pool and optional backing storage.
pub struct Wallet {
    keystore: KeyStore,
    pool: AddressPool,
    metadata: WalletMetadata,
    storage: Option<WalletStorage>,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("keystore", &self.keystore)
            .field("wallet_type", &self.metadata.wallet_type)
            .field("receiving", &self.pool.len(Branch::Receiving))
            .field("change", &self.pool.len(Branch::Change))
            .finish()
    }
}

impl Wallet {
    fn assemble(
        keystore: KeyStore,
        limits: GapLimits,
        wallet_type: &str,
    ) -> Result<Self, WalletError> {
        let pool = AddressPool::new(&keystore, limits)?;
        tracing::info!(
            wallet_type,
            keystore = keystore.id(),
            receiving = pool.len(Branch::Receiving),
            change = pool.len(Branch::Change),
            "wallet ready"
        );
        Ok(Self {
            keystore,
            pool,
            metadata: WalletMetadata::new(wallet_type),
            storage: None,
        })
    }

    /// Create a wallet with a freshly generated electrum seed.
    ///
    /// Returns the wallet and the phrase; the phrase is not stored.
    pub fn create(seed_type: SeedType, config: &WalletConfig) -> Result<(Self, String), WalletError> {
        let phrase = seed::generate_mnemonic(seed_type);
        let wallet = Self::restore_from_text(&phrase, None, config)?;
        Ok((wallet, phrase))
    }

    /// Restore from an electrum seed, an extended key, or a list of
    /// `[script:]WIF` private keys separated by whitespace.
    ///
    /// `seed_passphrase` only applies to seeds.
    pub fn restore_from_text(
        text: &str,
        seed_passphrase: Option<&str>,
        config: &WalletConfig,
    ) -> Result<Self, WalletError> {
        let text = text.trim();
        let limits = config.gap_limits();

        if seed::seed_type(text).is_some() {
            let (seed, kind) = Seed::from_electrum_mnemonic(text, seed_passphrase.unwrap_or(""))?;
            let ks = DeterministicKeyStore::from_electrum_seed(&seed, kind, config.network)?;
            let wallet_type = match kind {
                SeedType::Standard => "standard",
                SeedType::Segwit => "segwit",
            };
            return Self::assemble(KeyStore::Deterministic(ks), limits, wallet_type);
        }

        if let Ok(key) = ExtendedKey::decode(text) {
            let wallet_type = match key.kind() {
                KeyKind::Private => "xprv",
                KeyKind::Public => "xpub",
            };
            let ks = DeterministicKeyStore::from_account(key)?;
            return Self::assemble(KeyStore::Deterministic(ks), limits, wallet_type);
        }

        if seed::is_bip39_mnemonic(text) {
            return Err(WalletError::UnrecognizedInput(
                "BIP-39 mnemonic: restore it with an explicit derivation path".into(),
            ));
        }

        let mut store = ImportedKeyStore::new(config.network);
        for token in text.split_whitespace() {
            let (script_type, key) = PrivateKey::from_typed_wif(token).map_err(|_| {
                WalletError::UnrecognizedInput(
                    "expected an electrum seed, an extended key or private keys".into(),
                )
            })?;
            store.import(key, script_type)?;
        }
        if store.is_empty() {
            return Err(WalletError::UnrecognizedInput("empty input".into()));
        }
        Self::assemble(KeyStore::Imported(store), limits, "imported")
    }

    /// Restore from a BIP-39 mnemonic with an explicit account path.
    pub fn from_bip39(
        phrase: &str,
        passphrase: &str,
        path: &DerivationPath,
        script_type: ScriptType,
        config: &WalletConfig,
    ) -> Result<Self, WalletError> {
        let seed = Seed::from_bip39_mnemonic(phrase, passphrase)?;
        let ks = DeterministicKeyStore::from_seed_at(&seed, config.network, script_type, path)?;
        Self::assemble(KeyStore::Deterministic(ks), config.gap_limits(), "bip39")
    }

    /// Rebuild a wallet from a document.
    pub fn from_document(doc: &WalletDocument) -> Result<Self, WalletError> {
        let data: KeyStoreData = doc.require(document::KEYSTORE)?;
        let keystore = KeyStore::from_data(&data)?;
        let snapshot: PoolSnapshot = doc.require(document::ADDRESS_POOL)?;
        let pool = AddressPool::restore(&keystore, snapshot)?;
        let metadata = doc
            .section(document::METADATA)?
            .unwrap_or_else(|| WalletMetadata::new("unknown"));
        Ok(Self {
            keystore,
            pool,
            metadata,
            storage: None,
        })
    }

    pub fn to_document(&self) -> Result<WalletDocument, WalletError> {
        let mut doc = WalletDocument::new();
        doc.set_section(document::KEYSTORE, &self.keystore.to_data())?;
        doc.set_section(document::ADDRESS_POOL, &self.pool.snapshot())?;
        doc.set_section(document::METADATA, &self.metadata)?;
        Ok(doc)
    }

    /// Load a wallet from opened storage; the storage stays attached.
    pub fn load(storage: WalletStorage, doc: &WalletDocument) -> Result<Self, WalletError> {
        if doc.is_empty() {
            return Err(WalletError::CorruptFile("wallet file has no content".into()));
        }
        let mut wallet = Self::from_document(doc)?;
        wallet.storage = Some(storage);
        Ok(wallet)
    }

    /// Attach storage; subsequent [`save`](Self::save) calls write there.
    pub fn attach_storage(&mut self, storage: WalletStorage) {
        self.storage = Some(storage);
    }

    pub fn storage(&self) -> Option<&WalletStorage> {
        self.storage.as_ref()
    }

    /// Write the current state to the attached storage.
    pub fn save(&mut self) -> Result<(), WalletError> {
        let doc = self.to_document()?;
        let storage = self
            .storage
            .as_mut()
            .ok_or_else(|| WalletError::Io("no storage attached".into()))?;
        storage.write(&doc)
    }

    /// Change (or remove) the file passphrase and rewrite the file.
    pub fn set_passphrase(&mut self, passphrase: Option<&str>) -> Result<(), WalletError> {
        self.storage
            .as_mut()
            .ok_or_else(|| WalletError::Io("no storage attached".into()))?
            .set_passphrase(passphrase)?;
        self.save()
    }

    pub fn keystore(&self) -> &KeyStore {
        &self.keystore
    }

    pub fn pool(&self) -> &AddressPool {
        &self.pool
    }

    pub fn metadata(&self) -> &WalletMetadata {
        &self.metadata
    }

    pub fn set_label(&mut self, key: &str, label: &str) {
        if label.is_empty() {
            self.metadata.labels.remove(key);
        } else {
            self.metadata.labels.insert(key.to_string(), label.to_string());
        }
    }

    pub fn capability(&self) -> Capability {
        self.keystore.capability()
    }

    pub fn master_public_key(&self) -> Option<String> {
        self.keystore.master_public_key()
    }

    /// Materialized addresses of `branch` in index order.
    pub fn addresses(&self, branch: Branch) -> impl Iterator<Item = &Address> + Clone + '_ {
        self.pool.addresses(branch)
    }

    pub fn is_mine(&self, address: &Address) -> bool {
        self.pool.is_mine(address)
    }

    /// Record address history reported by the network layer.
    pub fn mark_used(&mut self, address: &Address) -> Result<bool, WalletError> {
        self.pool.mark_used(&self.keystore, address)
    }

    pub fn ensure_gap(&mut self, branch: Branch) -> Result<Vec<Address>, WalletError> {
        self.pool.ensure_gap(&self.keystore, branch)
    }

    /// Replace the pool with one built for new gap limits.
    pub fn set_gap_limits(&mut self, limits: GapLimits) -> Result<(), WalletError> {
        self.pool = AddressPool::rebuild(&self.keystore, limits)?;
        Ok(())
    }

    /// Import another `[script:]WIF` key into an imported-key wallet.
    ///
    /// Store and pool change together or not at all.
    pub fn import_private_key(&mut self, text: &str) -> Result<Address, WalletError> {
        let KeyStore::Imported(store) = &self.keystore else {
            return Err(WalletError::UnrecognizedInput(
                "keys can only be imported into an imported-key wallet".into(),
            ));
        };
        let (script_type, key) = PrivateKey::from_typed_wif(text.trim())?;

        let mut staged = store.clone();
        let id = staged.import(key, script_type)?;
        let keystore = KeyStore::Imported(staged);
        let mut pool = self.pool.clone();
        pool.sync_imported(&keystore)?;
        let address = keystore.address_for(&Coordinates::Imported { id })?;

        self.keystore = keystore;
        self.pool = pool;
        tracing::debug!(%address, "imported private key");
        Ok(address)
    }

    /// Export the key for one address as `"<script>:<WIF>"`.
    pub fn get_private_key(&self, address: &str) -> Result<String, WalletError> {
        let parsed = parse_wallet_address(address)?;
        let key = self.keystore.key_for_address(&self.pool, &parsed)?;
        let coords = self
            .pool
            .coordinates_of(&parsed)
            .ok_or_else(|| WalletError::AddressNotInWallet(address.to_string()))?;
        let script_type = self.keystore.script_type_at(coords)?;
        Ok(key.to_typed_wif(script_type))
    }

    /// Export keys for several addresses; any failure fails the whole batch.
    pub fn get_private_keys<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Vec<String>, WalletError> {
        addresses
            .iter()
            .map(|a| self.get_private_key(a.as_ref()))
            .collect()
    }

    /// Encrypt a message to any hex public key.
    pub fn encrypt_message(&self, pubkey_hex: &str, message: &str) -> Result<String, WalletError> {
        crypto_box::encrypt_message(pubkey_hex, message)
    }

    /// Decrypt a message sent to one of this wallet's public keys.
    pub fn decrypt_message(&self, pubkey_hex: &str, ciphertext: &str) -> Result<String, WalletError> {
        let public = public_key_from_hex(pubkey_hex)?;
        let key = self.keystore.private_key_for_public(&self.pool, &public)?;
        crypto_box::decrypt_message(&key, ciphertext)
    }
}

/// Parse address text for a wallet lookup.
///
/// Text with a bad checksum names no address this wallet could hold, so it
/// is reported as not in wallet; other malformed text is an invalid address.
fn parse_wallet_address(text: &str) -> Result<Address, WalletError> {
    match Address::decode(text.trim()) {
        Ok(a) => Ok(a),
        Err(AddressError::InvalidChecksum)
        | Err(AddressError::Base58(Base58Error::InvalidChecksum)) => {
            Err(WalletError::AddressNotInWallet(text.to_string()))
        }
        Err(e) => Err(WalletError::InvalidAddress(format!("{text}: {e}"))),
    }
}

/// Shared wallet behind a read/write lock.
///
/// Mutations take the write lock; lookups over materialized data take the
/// read lock.
#[derive(Clone)]
pub struct WalletHandle {
    inner: Arc<RwLock<Wallet>>,
}

impl WalletHandle {
    pub fn new(wallet: Wallet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(wallet)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Wallet> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Wallet> {
        self.inner.write()
    }

    /// Owned copy of the current addresses of `branch`.
    pub fn addresses(&self, branch: Branch) -> Vec<Address> {
        self.inner.read().addresses(branch).cloned().collect()
    }

    pub fn is_mine(&self, address: &Address) -> bool {
        self.inner.read().is_mine(address)
    }

    pub fn mark_used(&self, address: &Address) -> Result<bool, WalletError> {
        self.inner.write().mark_used(address)
    }

    pub fn ensure_gap(&self, branch: Branch) -> Result<Vec<Address>, WalletError> {
        self.inner.write().ensure_gap(branch)
    }

    pub fn get_private_keys<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Vec<String>, WalletError> {
        self.inner.read().get_private_keys(addresses)
    }

    pub fn save(&self) -> Result<(), WalletError> {
        self.inner.write().save()
    }
}

//! Key stores: where a wallet's key material lives.
//!
//! A [`KeyStore`] is either deterministic (an account-level extended key,
//! private or public) or a set of individually imported private keys. Every
//! address the wallet knows is a pure function of a store's public material
//! and a [`Coordinates`] value.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use trc_core::constants::{Network, ScriptType};
use trc_core::crypto::{PrivateKey, PublicKey};
use trc_core::derivation::{derive_child, derive_path, master_from_seed, ChildNumber, DerivationPath};
use trc_core::xkey::ExtendedKey;
use trc_core::Address;

use crate::address_pool::AddressPool;
use crate::error::WalletError;
use crate::seed::{Seed, SeedType};

/// Address chain under a deterministic account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Receiving,
    Change,
}

impl Branch {
    pub const ALL: [Branch; 2] = [Branch::Receiving, Branch::Change];

    /// Child index of the branch under the account key.
    pub fn index(&self) -> u32 {
        match self {
            Self::Receiving => 0,
            Self::Change => 1,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Receiving => write!(f, "receiving"),
            Self::Change => write!(f, "change"),
        }
    }
}

/// Where a key lives inside its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Coordinates {
    /// `account/branch/index` of a deterministic store.
    Derived { branch: Branch, index: u32 },
    /// Import id of an imported key.
    Imported { id: u32 },
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Derived { branch, index } => write!(f, "{}/{index}", branch.index()),
            Self::Imported { id } => write!(f, "imported#{id}"),
        }
    }
}

/// Whether a store can produce private keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Signing,
    WatchOnly,
}

/// Keys derived from one account-level extended key.
///
/// Branch parents (`account/0`, `account/1`) are cached in public form so
/// address generation never touches the private scalar.
#[derive(Clone)]
pub struct DeterministicKeyStore {
    account: ExtendedKey,
    branches: [ExtendedKey; 2],
    id: String,
}

impl DeterministicKeyStore {
    /// Build a store around an account key (xprv for signing, xpub for watch-only).
    pub fn from_account(account: ExtendedKey) -> Result<Self, WalletError> {
        let public = account.neuter();
        let receiving = derive_child(&public, ChildNumber::Normal(Branch::Receiving.index()))?;
        let change = derive_child(&public, ChildNumber::Normal(Branch::Change.index()))?;
        let id = hex::encode(account.fingerprint());
        Ok(Self {
            account,
            branches: [receiving, change],
            id,
        })
    }

    /// Account for an electrum seed: `m` for standard, `m/0'` for segwit.
    pub fn from_electrum_seed(
        seed: &Seed,
        seed_type: SeedType,
        network: Network,
    ) -> Result<Self, WalletError> {
        Self::from_seed_at(
            seed,
            network,
            seed_type.script_type(),
            &seed_type.account_path(),
        )
    }

    /// Account at an explicit path below the master key of `seed`.
    pub fn from_seed_at(
        seed: &Seed,
        network: Network,
        script_type: ScriptType,
        path: &DerivationPath,
    ) -> Result<Self, WalletError> {
        let master = master_from_seed(seed.as_bytes(), network, script_type)?;
        let account = derive_path(&master, path)?;
        Self::from_account(account)
    }

    pub fn account(&self) -> &ExtendedKey {
        &self.account
    }

    pub fn script_type(&self) -> ScriptType {
        self.account.script_type()
    }

    pub fn network(&self) -> Network {
        self.account.network()
    }

    pub fn is_watch_only(&self) -> bool {
        !self.account.is_private()
    }

    fn branch_key(&self, branch: Branch) -> &ExtendedKey {
        &self.branches[branch.index() as usize]
    }

    pub fn public_key_at(&self, branch: Branch, index: u32) -> Result<PublicKey, WalletError> {
        let child = ChildNumber::normal(index).map_err(trc_core::KeyError::from)?;
        Ok(derive_child(self.branch_key(branch), child)?.public_key())
    }

    pub fn private_key_at(&self, branch: Branch, index: u32) -> Result<PrivateKey, WalletError> {
        if self.is_watch_only() {
            return Err(WalletError::NoPrivateKey);
        }
        let child = ChildNumber::normal(index).map_err(trc_core::KeyError::from)?;
        let path = DerivationPath::from(vec![ChildNumber::Normal(branch.index()), child]);
        derive_path(&self.account, &path)?
            .private_key()
            .ok_or(WalletError::NoPrivateKey)
    }
}

impl fmt::Debug for DeterministicKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeterministicKeyStore")
            .field("id", &self.id)
            .field("script_type", &self.script_type())
            .field("watch_only", &self.is_watch_only())
            .finish()
    }
}

/// One imported key and the script type it pays to.
#[derive(Clone, PartialEq, Eq)]
pub struct ImportedKey {
    pub key: PrivateKey,
    pub script_type: ScriptType,
}

/// Individually imported private keys, keyed by a sequential import id.
#[derive(Clone)]
pub struct ImportedKeyStore {
    id: String,
    network: Network,
    keys: BTreeMap<u32, ImportedKey>,
    next_id: u32,
}

impl ImportedKeyStore {
    /// Empty store with a fresh random id.
    pub fn new(network: Network) -> Self {
        let mut raw = [0u8; 4];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        Self {
            id: format!("imported-{}", hex::encode(raw)),
            network,
            keys: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Import a key; importing an already present key returns its id.
    pub fn import(&mut self, key: PrivateKey, script_type: ScriptType) -> Result<u32, WalletError> {
        if key.network() != self.network {
            return Err(WalletError::UnrecognizedInput(format!(
                "{} key in a {} wallet",
                key.network(),
                self.network
            )));
        }
        if !key.is_compressed() {
            return Err(WalletError::UnrecognizedInput(
                "uncompressed private keys are not supported".into(),
            ));
        }
        // Rejects script types that are not single-key.
        Address::from_public_key(&key.public_key(), script_type, self.network)?;

        let public = key.public_key();
        if let Some((id, _)) = self
            .keys
            .iter()
            .find(|(_, k)| k.key.public_key() == public && k.script_type == script_type)
        {
            return Ok(*id);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.keys.insert(id, ImportedKey { key, script_type });
        Ok(id)
    }

    /// Import ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.keys.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn get(&self, id: u32) -> Result<&ImportedKey, WalletError> {
        self.keys
            .get(&id)
            .ok_or_else(|| WalletError::AddressNotOwned(format!("import id {id}")))
    }
}

impl fmt::Debug for ImportedKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportedKeyStore")
            .field("id", &self.id)
            .field("network", &self.network)
            .field("keys", &self.keys.len())
            .finish()
    }
}

/// Any key store the wallet can hold.
#[derive(Debug, Clone)]
pub enum KeyStore {
    Deterministic(DeterministicKeyStore),
    Imported(ImportedKeyStore),
}

impl KeyStore {
    /// Stable identifier, recorded by the address pool built on this store.
    pub fn id(&self) -> &str {
        match self {
            Self::Deterministic(ks) => &ks.id,
            Self::Imported(ks) => &ks.id,
        }
    }

    pub fn network(&self) -> Network {
        match self {
            Self::Deterministic(ks) => ks.network(),
            Self::Imported(ks) => ks.network(),
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::Deterministic(ks) if ks.is_watch_only() => Capability::WatchOnly,
            _ => Capability::Signing,
        }
    }

    /// Whether the pool on this store keeps a gap-limit lookahead.
    pub fn is_deterministic(&self) -> bool {
        matches!(self, Self::Deterministic(_))
    }

    /// Account-level extended public key, for deterministic stores.
    pub fn master_public_key(&self) -> Option<String> {
        match self {
            Self::Deterministic(ks) => Some(ks.account.neuter().encode()),
            Self::Imported(_) => None,
        }
    }

    /// Script type that the key at `coords` pays to.
    pub fn script_type_at(&self, coords: &Coordinates) -> Result<ScriptType, WalletError> {
        match (self, coords) {
            (Self::Deterministic(ks), Coordinates::Derived { .. }) => Ok(ks.script_type()),
            (Self::Imported(ks), Coordinates::Imported { id }) => Ok(ks.get(*id)?.script_type),
            _ => Err(WalletError::AddressNotOwned(coords.to_string())),
        }
    }

    pub fn public_key_at(&self, coords: &Coordinates) -> Result<PublicKey, WalletError> {
        match (self, coords) {
            (Self::Deterministic(ks), Coordinates::Derived { branch, index }) => {
                ks.public_key_at(*branch, *index)
            }
            (Self::Imported(ks), Coordinates::Imported { id }) => Ok(ks.get(*id)?.key.public_key()),
            _ => Err(WalletError::AddressNotOwned(coords.to_string())),
        }
    }

    /// Private key at `coords`. Watch-only stores fail with `NoPrivateKey`.
    pub fn private_key_at(&self, coords: &Coordinates) -> Result<PrivateKey, WalletError> {
        match (self, coords) {
            (Self::Deterministic(ks), Coordinates::Derived { branch, index }) => {
                ks.private_key_at(*branch, *index)
            }
            (Self::Imported(ks), Coordinates::Imported { id }) => Ok(ks.get(*id)?.key.clone()),
            _ => Err(WalletError::AddressNotOwned(coords.to_string())),
        }
    }

    pub fn address_for(&self, coords: &Coordinates) -> Result<Address, WalletError> {
        let public = self.public_key_at(coords)?;
        let script_type = self.script_type_at(coords)?;
        Ok(Address::from_public_key(&public, script_type, self.network())?)
    }

    /// Private key behind an address the pool has already materialized.
    ///
    /// Never derives past the pool's lookahead. Ownership is decided before
    /// capability: a foreign address is `AddressNotInWallet` even when the
    /// store is watch-only.
    pub fn key_for_address(
        &self,
        pool: &AddressPool,
        address: &Address,
    ) -> Result<PrivateKey, WalletError> {
        pool.check_owner(self)?;
        let coords = pool
            .coordinates_of(address)
            .ok_or_else(|| WalletError::AddressNotInWallet(address.to_string()))?;
        self.private_key_at(coords)
    }

    /// Private key owning `public`, searched among materialized coordinates.
    pub fn private_key_for_public(
        &self,
        pool: &AddressPool,
        public: &PublicKey,
    ) -> Result<PrivateKey, WalletError> {
        pool.check_owner(self)?;
        for coords in pool.coordinates() {
            if self.public_key_at(coords)? == *public {
                return self.private_key_at(coords);
            }
        }
        Err(WalletError::AddressNotInWallet(hex::encode(public.serialize())))
    }

    pub fn to_data(&self) -> KeyStoreData {
        match self {
            Self::Deterministic(ks) => KeyStoreData::Deterministic {
                account: ks.account.clone(),
            },
            Self::Imported(ks) => KeyStoreData::Imported {
                id: ks.id.clone(),
                network: ks.network,
                next_id: ks.next_id,
                keys: ks
                    .keys
                    .iter()
                    .map(|(id, k)| ImportedKeyData {
                        id: *id,
                        key: k.key.to_typed_wif(k.script_type),
                    })
                    .collect(),
            },
        }
    }

    pub fn from_data(data: &KeyStoreData) -> Result<Self, WalletError> {
        match data {
            KeyStoreData::Deterministic { account } => Ok(Self::Deterministic(
                DeterministicKeyStore::from_account(account.clone())?,
            )),
            KeyStoreData::Imported {
                id,
                network,
                next_id,
                keys,
            } => {
                let mut map = BTreeMap::new();
                for entry in keys {
                    let (script_type, key) = PrivateKey::from_typed_wif(&entry.key)?;
                    if key.network() != *network || entry.id >= *next_id {
                        return Err(WalletError::CorruptFile(format!(
                            "inconsistent imported key {}",
                            entry.id
                        )));
                    }
                    map.insert(entry.id, ImportedKey { key, script_type });
                }
                Ok(Self::Imported(ImportedKeyStore {
                    id: id.clone(),
                    network: *network,
                    keys: map,
                    next_id: *next_id,
                }))
            }
        }
    }
}

/// Serializable form of a key store for the wallet document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyStoreData {
    Deterministic {
        /// Account key in text form (xprv or xpub family).
        account: ExtendedKey,
    },
    Imported {
        id: String,
        network: Network,
        next_id: u32,
        keys: Vec<ImportedKeyData>,
    },
}

/// One imported key as `"<script>:<WIF>"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedKeyData {
    pub id: u32,
    pub key: String,
}

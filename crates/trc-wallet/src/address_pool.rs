//! Deterministic address pool with gap-limit lookahead.
//!
//! For each branch the pool keeps `gap_limit` unused addresses after the last
//! used one. Entries are never removed and `used` never flips back, so an
//! address keeps its coordinates for the life of the pool.
//!
//! The pool holds only public data plus the id of the key store it was built
//! on. Operations that derive new addresses borrow that store and refuse any
//! other.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use trc_core::constants::{DEFAULT_CHANGE_GAP_LIMIT, DEFAULT_GAP_LIMIT};
use trc_core::Address;

use crate::error::WalletError;
use crate::keystore::{Branch, Coordinates, KeyStore};

/// Per-branch lookahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapLimits {
    pub receiving: u32,
    pub change: u32,
}

impl GapLimits {
    pub fn for_branch(&self, branch: Branch) -> u32 {
        match branch {
            Branch::Receiving => self.receiving,
            Branch::Change => self.change,
        }
    }
}

impl Default for GapLimits {
    fn default() -> Self {
        Self {
            receiving: DEFAULT_GAP_LIMIT,
            change: DEFAULT_CHANGE_GAP_LIMIT,
        }
    }
}

/// One materialized address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub address: Address,
    pub coordinates: Coordinates,
    pub used: bool,
}

/// Serializable pool state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub keystore_id: String,
    pub gap_limits: GapLimits,
    pub receiving: Vec<PoolEntry>,
    pub change: Vec<PoolEntry>,
}

#[derive(Debug, Clone)]
pub struct AddressPool {
    keystore_id: String,
    limits: GapLimits,
    deterministic: bool,
    receiving: Vec<PoolEntry>,
    change: Vec<PoolEntry>,
    lookup: HashMap<Address, (Branch, usize)>,
}

impl AddressPool {
    /// Materialize the initial lookahead for `keystore`.
    ///
    /// Imported stores get one receiving entry per key and no change branch.
    pub fn new(keystore: &KeyStore, limits: GapLimits) -> Result<Self, WalletError> {
        let mut pool = Self {
            keystore_id: keystore.id().to_string(),
            limits,
            deterministic: keystore.is_deterministic(),
            receiving: Vec::new(),
            change: Vec::new(),
            lookup: HashMap::new(),
        };
        if pool.deterministic {
            for branch in Branch::ALL {
                pool.ensure_gap(keystore, branch)?;
            }
        } else {
            pool.sync_imported(keystore)?;
        }
        Ok(pool)
    }

    /// Fresh pool with new limits; usage must be re-learned from the network.
    pub fn rebuild(keystore: &KeyStore, limits: GapLimits) -> Result<Self, WalletError> {
        tracing::info!(
            receiving = limits.receiving,
            change = limits.change,
            "rebuilding address pool"
        );
        Self::new(keystore, limits)
    }

    pub fn keystore_id(&self) -> &str {
        &self.keystore_id
    }

    pub fn gap_limits(&self) -> GapLimits {
        self.limits
    }

    pub(crate) fn check_owner(&self, keystore: &KeyStore) -> Result<(), WalletError> {
        if keystore.id() != self.keystore_id {
            return Err(WalletError::KeyStoreMismatch {
                pool: self.keystore_id.clone(),
                keystore: keystore.id().to_string(),
            });
        }
        Ok(())
    }

    fn entries_mut(&mut self, branch: Branch) -> &mut Vec<PoolEntry> {
        match branch {
            Branch::Receiving => &mut self.receiving,
            Branch::Change => &mut self.change,
        }
    }

    /// Materialized entries of `branch` in index order.
    pub fn entries(&self, branch: Branch) -> &[PoolEntry] {
        match branch {
            Branch::Receiving => &self.receiving,
            Branch::Change => &self.change,
        }
    }

    /// Number of entries required on `branch` for the gap to hold.
    fn required_len(&self, branch: Branch) -> usize {
        let limit = self.limits.for_branch(branch) as usize;
        let used_prefix = self
            .entries(branch)
            .iter()
            .rposition(|e| e.used)
            .map_or(0, |i| i + 1);
        used_prefix + limit
    }

    /// Extend `branch` until it ends with `gap_limit` unused entries.
    ///
    /// Returns the newly added addresses. A no-op for imported stores.
    pub fn ensure_gap(
        &mut self,
        keystore: &KeyStore,
        branch: Branch,
    ) -> Result<Vec<Address>, WalletError> {
        self.check_owner(keystore)?;
        if !self.deterministic {
            return Ok(Vec::new());
        }
        let target = self.required_len(branch);
        let mut added = Vec::new();
        while self.entries(branch).len() < target {
            let index = self.entries(branch).len();
            let coordinates = Coordinates::Derived {
                branch,
                index: u32::try_from(index)
                    .map_err(|_| WalletError::CorruptFile("address index overflow".into()))?,
            };
            let address = keystore.address_for(&coordinates)?;
            self.lookup.insert(address.clone(), (branch, index));
            self.entries_mut(branch).push(PoolEntry {
                address: address.clone(),
                coordinates,
                used: false,
            });
            added.push(address);
        }
        if !added.is_empty() {
            tracing::debug!(%branch, added = added.len(), total = target, "extended address pool");
        }
        Ok(added)
    }

    /// Append entries for keys imported since the pool was built.
    pub fn sync_imported(&mut self, keystore: &KeyStore) -> Result<Vec<Address>, WalletError> {
        self.check_owner(keystore)?;
        let KeyStore::Imported(store) = keystore else {
            return Ok(Vec::new());
        };
        let mut added = Vec::new();
        for id in store.ids() {
            let coordinates = Coordinates::Imported { id };
            if self.receiving.iter().any(|e| e.coordinates == coordinates) {
                continue;
            }
            let address = keystore.address_for(&coordinates)?;
            self.lookup
                .insert(address.clone(), (Branch::Receiving, self.receiving.len()));
            self.receiving.push(PoolEntry {
                address: address.clone(),
                coordinates,
                used: false,
            });
            added.push(address);
        }
        Ok(added)
    }

    /// Record that `address` has history. Returns `false` if it already had.
    pub fn mark_used(&mut self, keystore: &KeyStore, address: &Address) -> Result<bool, WalletError> {
        self.check_owner(keystore)?;
        let (branch, index) = *self
            .lookup
            .get(address)
            .ok_or_else(|| WalletError::UnknownAddress(address.to_string()))?;
        let entry = &mut self.entries_mut(branch)[index];
        if entry.used {
            return Ok(false);
        }
        entry.used = true;
        self.ensure_gap(keystore, branch)?;
        Ok(true)
    }

    /// Addresses of `branch` in index order, over the current length only.
    pub fn addresses(&self, branch: Branch) -> impl Iterator<Item = &Address> + Clone + '_ {
        self.entries(branch).iter().map(|e| &e.address)
    }

    /// Coordinates of every materialized entry, receiving first.
    pub fn coordinates(&self) -> impl Iterator<Item = &Coordinates> + '_ {
        self.receiving
            .iter()
            .chain(self.change.iter())
            .map(|e| &e.coordinates)
    }

    pub fn is_mine(&self, address: &Address) -> bool {
        self.lookup.contains_key(address)
    }

    pub fn coordinates_of(&self, address: &Address) -> Option<&Coordinates> {
        self.entry(address).map(|e| &e.coordinates)
    }

    pub fn is_used(&self, address: &Address) -> Option<bool> {
        self.entry(address).map(|e| e.used)
    }

    fn entry(&self, address: &Address) -> Option<&PoolEntry> {
        self.lookup
            .get(address)
            .map(|(branch, index)| &self.entries(*branch)[*index])
    }

    pub fn len(&self, branch: Branch) -> usize {
        self.entries(branch).len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiving.is_empty() && self.change.is_empty()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            keystore_id: self.keystore_id.clone(),
            gap_limits: self.limits,
            receiving: self.receiving.clone(),
            change: self.change.clone(),
        }
    }

    /// Rebuild a pool from a snapshot, re-deriving every address.
    ///
    /// Any entry whose address or position disagrees with `keystore` is
    /// rejected as `CorruptFile`. Missing lookahead is filled in.
    pub fn restore(keystore: &KeyStore, snapshot: PoolSnapshot) -> Result<Self, WalletError> {
        if snapshot.keystore_id != keystore.id() {
            return Err(WalletError::KeyStoreMismatch {
                pool: snapshot.keystore_id,
                keystore: keystore.id().to_string(),
            });
        }
        let mut pool = Self {
            keystore_id: snapshot.keystore_id,
            limits: snapshot.gap_limits,
            deterministic: keystore.is_deterministic(),
            receiving: Vec::new(),
            change: Vec::new(),
            lookup: HashMap::new(),
        };
        for (branch, entries) in [
            (Branch::Receiving, snapshot.receiving),
            (Branch::Change, snapshot.change),
        ] {
            for (position, entry) in entries.into_iter().enumerate() {
                let in_place = match entry.coordinates {
                    Coordinates::Derived { branch: b, index } => {
                        pool.deterministic && b == branch && index as usize == position
                    }
                    Coordinates::Imported { .. } => {
                        !pool.deterministic && branch == Branch::Receiving
                    }
                };
                if !in_place || keystore.address_for(&entry.coordinates)? != entry.address {
                    return Err(WalletError::CorruptFile(format!(
                        "address pool entry {} does not match key store",
                        entry.coordinates
                    )));
                }
                if pool.lookup.insert(entry.address.clone(), (branch, position)).is_some() {
                    return Err(WalletError::CorruptFile(format!(
                        "duplicate address {}",
                        entry.address
                    )));
                }
                pool.entries_mut(branch).push(entry);
            }
        }
        if pool.deterministic {
            for branch in Branch::ALL {
                pool.ensure_gap(keystore, branch)?;
            }
        } else {
            pool.sync_imported(keystore)?;
        }
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::{DeterministicKeyStore, ImportedKeyStore};
    use crate::seed::Seed;
    use trc_core::constants::{Network, ScriptType};
    use trc_core::PrivateKey;

    const SEED_PHRASE: &str =
        "hint shock chair puzzle shock traffic drastic note dinosaur mention suggest sweet";

    fn keystore() -> KeyStore {
        let (seed, kind) = Seed::from_electrum_mnemonic(SEED_PHRASE, "").unwrap();
        KeyStore::Deterministic(
            DeterministicKeyStore::from_electrum_seed(&seed, kind, Network::Mainnet).unwrap(),
        )
    }

    fn small() -> GapLimits {
        GapLimits {
            receiving: 3,
            change: 2,
        }
    }

    #[test]
    fn defaults_are_twenty_and_six() {
        let limits = GapLimits::default();
        assert_eq!(limits.receiving, 20);
        assert_eq!(limits.change, 6);
    }

    #[test]
    fn initial_pool_has_gap_limit_entries() {
        let ks = keystore();
        let pool = AddressPool::new(&ks, small()).unwrap();
        assert_eq!(pool.len(Branch::Receiving), 3);
        assert_eq!(pool.len(Branch::Change), 2);
        let first = pool.addresses(Branch::Receiving).next().unwrap();
        assert_eq!(first.to_string(), "1M5TAikkAhJ1myQY5ihAXqHWrFE5iVkh7c");
    }

    #[test]
    fn mark_used_extends_and_is_idempotent() {
        let ks = keystore();
        let mut pool = AddressPool::new(&ks, small()).unwrap();
        let second = pool.entries(Branch::Receiving)[1].address.clone();

        assert!(pool.mark_used(&ks, &second).unwrap());
        assert_eq!(pool.len(Branch::Receiving), 2 + 3);
        assert!(!pool.mark_used(&ks, &second).unwrap());
        assert_eq!(pool.len(Branch::Receiving), 5);
        assert_eq!(pool.is_used(&second), Some(true));
    }

    #[test]
    fn mark_used_unknown_address() {
        let ks = keystore();
        let mut pool = AddressPool::new(&ks, small()).unwrap();
        let stranger: Address = "14fvqmvaHt8bMeokezknBSCwdvaex5cj3p".parse().unwrap();
        assert!(matches!(
            pool.mark_used(&ks, &stranger),
            Err(WalletError::UnknownAddress(_))
        ));
    }

    #[test]
    fn used_earlier_entry_does_not_shrink_pool() {
        let ks = keystore();
        let mut pool = AddressPool::new(&ks, small()).unwrap();
        let third = pool.entries(Branch::Receiving)[2].address.clone();
        pool.mark_used(&ks, &third).unwrap();
        assert_eq!(pool.len(Branch::Receiving), 6);
        let first = pool.entries(Branch::Receiving)[0].address.clone();
        pool.mark_used(&ks, &first).unwrap();
        assert_eq!(pool.len(Branch::Receiving), 6);
    }

    #[test]
    fn addresses_iterator_is_restartable() {
        let ks = keystore();
        let pool = AddressPool::new(&ks, small()).unwrap();
        let iter = pool.addresses(Branch::Change);
        let again = iter.clone();
        assert_eq!(iter.count(), 2);
        let collected: Vec<_> = again.map(|a| a.to_string()).collect();
        assert_eq!(
            collected,
            vec![
                "1DRbTcu9dNE7WiAYMejjCZGYgo9n2qqz6o",
                "16roH9JEdzJ2rLjr8aLiW3XUoPVDm6pVHY"
            ]
        );
    }

    #[test]
    fn foreign_keystore_rejected() {
        let ks = keystore();
        let mut pool = AddressPool::new(&ks, small()).unwrap();
        let other = KeyStore::Imported(ImportedKeyStore::new(Network::Mainnet));
        assert!(matches!(
            pool.ensure_gap(&other, Branch::Receiving),
            Err(WalletError::KeyStoreMismatch { .. })
        ));
    }

    #[test]
    fn imported_pool_has_no_change_branch() {
        let mut store = ImportedKeyStore::new(Network::Mainnet);
        for wif in [
            "L4rYY5QpfN6wJEF4SEKDpcGhTPnCe9zcGs6hiSnhpprZqVywFifN",
            "L4jkdiXszG26SUYvwwJhzGwg37H2nLhrbip7u6crmgNeJysv5FHL",
        ] {
            store
                .import(PrivateKey::from_wif(wif).unwrap(), ScriptType::P2pkh)
                .unwrap();
        }
        let ks = KeyStore::Imported(store);
        let mut pool = AddressPool::new(&ks, GapLimits::default()).unwrap();
        assert_eq!(pool.len(Branch::Receiving), 2);
        assert_eq!(pool.len(Branch::Change), 0);
        let first = pool.entries(Branch::Receiving)[0].address.clone();
        assert!(pool.mark_used(&ks, &first).unwrap());
        assert_eq!(pool.len(Branch::Receiving), 2);
        assert!(pool.ensure_gap(&ks, Branch::Change).unwrap().is_empty());
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let ks = keystore();
        let mut pool = AddressPool::new(&ks, small()).unwrap();
        let addr = pool.entries(Branch::Change)[1].address.clone();
        pool.mark_used(&ks, &addr).unwrap();

        let json = serde_json::to_string(&pool.snapshot()).unwrap();
        let restored = AddressPool::restore(&ks, serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.snapshot(), pool.snapshot());
        assert_eq!(restored.is_used(&addr), Some(true));
    }

    #[test]
    fn restore_rejects_tampered_address() {
        let ks = keystore();
        let pool = AddressPool::new(&ks, small()).unwrap();
        let mut snap = pool.snapshot();
        snap.receiving.swap(0, 1);
        assert!(matches!(
            AddressPool::restore(&ks, snap),
            Err(WalletError::CorruptFile(_))
        ));
    }

    #[test]
    fn rebuild_starts_fresh() {
        let ks = keystore();
        let mut pool = AddressPool::new(&ks, small()).unwrap();
        let addr = pool.entries(Branch::Receiving)[0].address.clone();
        pool.mark_used(&ks, &addr).unwrap();
        let rebuilt = AddressPool::rebuild(
            &ks,
            GapLimits {
                receiving: 5,
                change: 1,
            },
        )
        .unwrap();
        assert_eq!(rebuilt.len(Branch::Receiving), 5);
        assert_eq!(rebuilt.is_used(&addr), Some(false));
    }
}

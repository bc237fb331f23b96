//! Versioned wallet document: named JSON sections.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use trc_core::constants::{DEFAULT_CHANGE_GAP_LIMIT, DEFAULT_GAP_LIMIT};

use crate::error::WalletError;

/// Schema version written by this crate.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Section holding the serialized key store.
pub const KEYSTORE: &str = "keystore";

/// Section holding the address pool snapshot.
pub const ADDRESS_POOL: &str = "address_pool";

/// Section holding [`WalletMetadata`].
pub const METADATA: &str = "metadata";

/// Mapping of section names to JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletDocument {
    sections: BTreeMap<String, Value>,
}

impl WalletDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.sections.insert(name.to_string(), value);
    }

    /// Deserialize a section, `None` when absent.
    pub fn section<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, WalletError> {
        self.sections
            .get(name)
            .map(|v| {
                T::deserialize(v)
                    .map_err(|e| WalletError::CorruptFile(format!("section {name}: {e}")))
            })
            .transpose()
    }

    /// Deserialize a section that must be present.
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, WalletError> {
        self.section(name)?
            .ok_or_else(|| WalletError::CorruptFile(format!("missing section {name}")))
    }

    pub fn set_section<T: Serialize>(&mut self, name: &str, value: &T) -> Result<(), WalletError> {
        let v = serde_json::to_value(value)
            .map_err(|e| WalletError::Serialization(e.to_string()))?;
        self.set(name, v);
        Ok(())
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, WalletError> {
        serde_json::to_vec(self).map_err(|e| WalletError::Serialization(e.to_string()))
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        serde_json::from_slice(bytes)
            .map_err(|e| WalletError::CorruptFile(format!("document body: {e}")))
    }
}

/// Bring a document written at `version` up to [`CURRENT_SCHEMA_VERSION`].
pub fn migrate(version: u32, mut doc: WalletDocument) -> Result<WalletDocument, WalletError> {
    if version > CURRENT_SCHEMA_VERSION {
        return Err(WalletError::UnsupportedVersion(version));
    }
    if version == 0 {
        return Err(WalletError::CorruptFile("schema version 0".into()));
    }
    if version < 2 {
        migrate_v1_gap_limit(&mut doc)?;
        tracing::info!(from = version, to = 2, "migrated wallet document");
    }
    Ok(doc)
}

/// Version 1 kept a single gap limit under `metadata.gap_limit`; version 2
/// stores per-branch limits inside the pool snapshot.
fn migrate_v1_gap_limit(doc: &mut WalletDocument) -> Result<(), WalletError> {
    let legacy = match doc.sections.get_mut(METADATA) {
        Some(Value::Object(meta)) => meta.remove("gap_limit"),
        _ => None,
    };
    let receiving = match legacy {
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| WalletError::CorruptFile(format!("bad legacy gap_limit {v}")))?,
        None => DEFAULT_GAP_LIMIT,
    };
    if let Some(Value::Object(pool)) = doc.sections.get_mut(ADDRESS_POOL) {
        pool.entry("gap_limits").or_insert_with(|| {
            serde_json::json!({
                "receiving": receiving,
                "change": DEFAULT_CHANGE_GAP_LIMIT,
            })
        });
    }
    Ok(())
}

/// Descriptive wallet data with no key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletMetadata {
    pub created_at: DateTime<Utc>,
    /// `standard`, `segwit`, `bip39`, `xpub`, `xprv` or `imported`.
    pub wallet_type: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl WalletMetadata {
    pub fn new(wallet_type: impl Into<String>) -> Self {
        Self {
            created_at: Utc::now(),
            wallet_type: wallet_type.into(),
            labels: BTreeMap::new(),
        }
    }
}

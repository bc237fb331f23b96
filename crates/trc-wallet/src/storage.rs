//! Wallet file persistence.
//!
//! # File format
//! ```text
//! "TRCW" (4) || header_len (u32 LE) || header JSON || body
//! ```
//! The header is always clear: `{schema_version, encrypted, salt, kdf}`.
//! The body is the document JSON, sealed with [`encryption::seal`] when the
//! wallet has a passphrase. Sealed bodies carry the exact header bytes as
//! associated data, so any header edit fails authentication.
//!
//! The schema version is checked straight after the header is parsed: a
//! file from a newer release is [`WalletError::UnsupportedVersion`] without
//! touching the KDF or the body.
//!
//! Writes hand the complete byte image to a [`StoragePort`], which replaces
//! the previous image atomically.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use crate::document::{self, WalletDocument, CURRENT_SCHEMA_VERSION};
use crate::encryption::{self, KdfParams, SALT_LEN};
use crate::error::WalletError;

/// Magic bytes identifying a TRC wallet file.
pub const WALLET_MAGIC: &[u8; 4] = b"TRCW";

/// Upper bound on the clear header, to reject garbage early.
const MAX_HEADER_LEN: usize = 4096;

/// Where the wallet image lives.
///
/// Ports are `Send + Sync` so a wallet holding one can sit behind a shared
/// [`WalletHandle`](crate::WalletHandle).
#[cfg_attr(test, mockall::automock)]
pub trait StoragePort: Send + Sync {
    /// Current image, `None` when nothing has been written yet.
    fn read(&self) -> Result<Option<Vec<u8>>, WalletError>;

    /// Replace the image. Either the old or the new image survives a crash.
    fn write_atomic(&mut self, data: &[u8]) -> Result<(), WalletError>;
}

/// A wallet file on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }
}

fn io_err(e: std::io::Error) -> WalletError {
    WalletError::Io(e.to_string())
}

impl StoragePort for FileStore {
    fn read(&self) -> Result<Option<Vec<u8>>, WalletError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }

    /// Temp file in the same directory, fsync, rename over the target,
    /// then fsync the directory so the rename itself is durable.
    fn write_atomic(&mut self, data: &[u8]) -> Result<(), WalletError> {
        let dir = self.dir().to_path_buf();
        fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(data).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path)
            .map_err(|e| WalletError::Io(e.error.to_string()))?;

        #[cfg(unix)]
        fs::File::open(&dir)
            .and_then(|d| d.sync_all())
            .map_err(io_err)?;
        Ok(())
    }
}

/// In-memory image. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current image.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.data.lock().clone()
    }

    /// Overwrite the image directly, bypassing the wallet layer.
    pub fn replace(&self, data: Vec<u8>) {
        *self.data.lock() = Some(data);
    }
}

impl StoragePort for MemoryStore {
    fn read(&self) -> Result<Option<Vec<u8>>, WalletError> {
        Ok(self.data.lock().clone())
    }

    fn write_atomic(&mut self, data: &[u8]) -> Result<(), WalletError> {
        *self.data.lock() = Some(data.to_vec());
        Ok(())
    }
}

/// Clear file header.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileHeader {
    schema_version: u32,
    encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kdf: Option<KdfParams>,
}

struct CipherState {
    salt: [u8; SALT_LEN],
    kdf: KdfParams,
    key: Zeroizing<[u8; 32]>,
}

impl CipherState {
    fn derive(passphrase: &str, salt: [u8; SALT_LEN], kdf: KdfParams) -> Result<Self, WalletError> {
        let key = encryption::derive_key(passphrase.as_bytes(), &salt, &kdf)?;
        Ok(Self { salt, kdf, key })
    }
}

/// Reads and writes one wallet image through a [`StoragePort`].
pub struct WalletStorage {
    port: Box<dyn StoragePort>,
    kdf: KdfParams,
    cipher: Option<CipherState>,
}

impl std::fmt::Debug for WalletStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletStorage")
            .field("encrypted", &self.is_encrypted())
            .field("kdf", &self.kdf)
            .finish()
    }
}

impl WalletStorage {
    /// Open with default Argon2 parameters for new files.
    pub fn open(
        port: Box<dyn StoragePort>,
        passphrase: Option<&str>,
    ) -> Result<(Self, WalletDocument), WalletError> {
        Self::open_with_kdf(port, passphrase, KdfParams::default())
    }

    /// Open the image behind `port`.
    ///
    /// An empty port yields an empty document; `kdf` then applies to the
    /// passphrase, if any. Existing files keep the parameters in their header.
    pub fn open_with_kdf(
        port: Box<dyn StoragePort>,
        passphrase: Option<&str>,
        kdf: KdfParams,
    ) -> Result<(Self, WalletDocument), WalletError> {
        let Some(bytes) = port.read()? else {
            let cipher = passphrase
                .map(|p| CipherState::derive(p, encryption::generate_salt(), kdf))
                .transpose()?;
            tracing::debug!(encrypted = cipher.is_some(), "new wallet storage");
            return Ok((Self { port, kdf, cipher }, WalletDocument::new()));
        };

        let (header, header_bytes, body) = split_image(&bytes)?;
        if header.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(WalletError::UnsupportedVersion(header.schema_version));
        }
        let (cipher, plain) = if header.encrypted {
            let passphrase = passphrase.ok_or(WalletError::DecryptionFailed)?;
            let salt_hex = header
                .salt
                .as_deref()
                .ok_or_else(|| WalletError::CorruptFile("encrypted file without salt".into()))?;
            let salt: [u8; SALT_LEN] = hex::decode(salt_hex)
                .ok()
                .and_then(|s| s.try_into().ok())
                .ok_or_else(|| WalletError::CorruptFile("malformed salt".into()))?;
            let file_kdf = header
                .kdf
                .ok_or_else(|| WalletError::CorruptFile("encrypted file without kdf".into()))?;
            file_kdf.check_bounds()?;
            let cipher = CipherState::derive(passphrase, salt, file_kdf)?;
            let plain = Zeroizing::new(encryption::open(&cipher.key, body, header_bytes)?);
            (Some(cipher), plain)
        } else {
            if passphrase.is_some() {
                tracing::warn!("passphrase given for an unencrypted wallet file; ignoring");
            }
            (None, Zeroizing::new(body.to_vec()))
        };

        let doc = WalletDocument::from_json_bytes(&plain)?;
        let doc = document::migrate(header.schema_version, doc)?;
        let kdf = cipher.as_ref().map_or(kdf, |c| c.kdf);
        tracing::info!(
            schema_version = header.schema_version,
            encrypted = header.encrypted,
            "opened wallet storage"
        );
        Ok((Self { port, kdf, cipher }, doc))
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Serialize, encrypt and atomically replace the stored image.
    pub fn write(&mut self, doc: &WalletDocument) -> Result<(), WalletError> {
        let plain = Zeroizing::new(doc.to_json_bytes()?);
        let header = FileHeader {
            schema_version: CURRENT_SCHEMA_VERSION,
            encrypted: self.cipher.is_some(),
            salt: self.cipher.as_ref().map(|c| hex::encode(c.salt)),
            kdf: self.cipher.as_ref().map(|c| c.kdf),
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| WalletError::Serialization(e.to_string()))?;
        let header_len = u32::try_from(header_json.len())
            .map_err(|_| WalletError::Serialization("header too large".into()))?;
        let body = match &self.cipher {
            Some(c) => encryption::seal(&c.key, &plain, &header_json)?,
            None => plain.to_vec(),
        };

        let mut image = Zeroizing::new(Vec::with_capacity(8 + header_json.len() + body.len()));
        image.extend_from_slice(WALLET_MAGIC);
        image.extend_from_slice(&header_len.to_le_bytes());
        image.extend_from_slice(&header_json);
        image.extend_from_slice(&body);
        self.port.write_atomic(&image)?;
        tracing::debug!(bytes = image.len(), encrypted = header.encrypted, "wallet written");
        Ok(())
    }

    /// Re-key with a fresh salt, or drop encryption with `None`.
    ///
    /// Takes effect on the next [`write`](Self::write).
    pub fn set_passphrase(&mut self, passphrase: Option<&str>) -> Result<(), WalletError> {
        self.cipher = passphrase
            .map(|p| CipherState::derive(p, encryption::generate_salt(), self.kdf))
            .transpose()?;
        tracing::info!(encrypted = self.cipher.is_some(), "wallet passphrase changed");
        Ok(())
    }
}

/// Parsed header, its raw bytes and the body.
fn split_image(bytes: &[u8]) -> Result<(FileHeader, &[u8], &[u8]), WalletError> {
    if bytes.len() < 8 {
        return Err(WalletError::CorruptFile("file too short".into()));
    }
    if &bytes[..4] != WALLET_MAGIC {
        return Err(WalletError::CorruptFile("invalid magic bytes".into()));
    }
    let header_len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    if header_len > MAX_HEADER_LEN || 8 + header_len > bytes.len() {
        return Err(WalletError::CorruptFile("header length out of range".into()));
    }
    let header_bytes = &bytes[8..8 + header_len];
    let header: FileHeader = serde_json::from_slice(header_bytes)
        .map_err(|e| WalletError::CorruptFile(format!("invalid header: {e}")))?;
    Ok((header, header_bytes, &bytes[8 + header_len..]))
}

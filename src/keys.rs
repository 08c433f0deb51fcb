//! Key custody.
//!
//! This module owns two responsibilities:
//! 1. Loading-or-generating the single vault key behind a named alias in a
//!    pluggable secure store, exactly once per process even under
//!    concurrent first use.
//! 2. Holding the key material in a type that is opaque, non-cloneable,
//!    and zeroised on drop.
//!
//! This is one of exactly two modules permitted to import `ring` directly
//! (the other is `crypto`). Raw key bytes never cross the crate boundary:
//! the custodian hands out encrypt/decrypt capability, not keys.

use std::io;
use std::path::PathBuf;

use tokio::sync::OnceCell;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{self, KEY_LEN};
use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Master key
// ---------------------------------------------------------------------------

/// The vault's symmetric key.
///
/// - Not `Clone`. Cannot be duplicated without explicit conversion.
/// - Zeroised on drop. Memory is overwritten before deallocation.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Borrow the raw key bytes for use in chunk seal/open operations.
    ///
    /// `pub(crate)` — raw bytes never leave the crate.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

// ---------------------------------------------------------------------------
// Secure store seam
// ---------------------------------------------------------------------------

/// Durable storage for key material, addressed by alias.
///
/// This is the seam where a deployment plugs in its platform key store
/// (TPM, keychain, Android Keystore, ...). The contract mirrors what those
/// stores provide: opaque persistence behind an alias, with no enumeration.
/// An inaccessible store (locked device, missing hardware) surfaces as an
/// `io::Error` and makes the whole vault session unavailable — it is never
/// treated as data loss.
pub trait SecureKeyStore: Send + Sync {
    /// Load key material for `alias`. `Ok(None)` means no key exists yet.
    fn load(&self, alias: &str) -> io::Result<Option<Vec<u8>>>;

    /// Persist key material under `alias`, atomically.
    fn store(&self, alias: &str, key: &[u8]) -> io::Result<()>;
}

/// File-backed [`SecureKeyStore`].
///
/// One file per alias under a directory the caller controls. Stands in for
/// a hardware-backed store on platforms without one; the file is created
/// with owner-only permissions on unix.
pub struct FileKeyStore {
    dir: PathBuf,
}

impl FileKeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, alias: &str) -> PathBuf {
        self.dir.join(format!("{}.key", alias))
    }
}

impl SecureKeyStore for FileKeyStore {
    fn load(&self, alias: &str) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.key_path(alias)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&self, alias: &str, key: &[u8]) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        io::Write::write_all(&mut tmp, key)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        tmp.persist(self.key_path(alias))
            .map_err(|e| e.error)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Custodian
// ---------------------------------------------------------------------------

/// Owns the vault key for the lifetime of the process.
///
/// `ensure_key` is idempotent and safe to call on every startup. The first
/// caller either loads the existing key from the store or generates a fresh
/// 256-bit key and persists it; concurrent first callers are serialised on
/// a single-initialisation barrier, so a race can neither create two keys
/// nor corrupt the store within one process.
pub struct KeyCustodian {
    store: Box<dyn SecureKeyStore>,
    alias: String,
    key: OnceCell<MasterKey>,
}

impl KeyCustodian {
    pub fn new(store: Box<dyn SecureKeyStore>, alias: impl Into<String>) -> Self {
        Self {
            store,
            alias: alias.into(),
            key: OnceCell::new(),
        }
    }

    /// Load or generate the vault key. Idempotent.
    pub async fn ensure_key(&self) -> Result<(), VaultError> {
        self.master().await.map(|_| ())
    }

    /// Borrow the resident key, initialising it on first use.
    pub(crate) async fn master(&self) -> Result<&MasterKey, VaultError> {
        self.key
            .get_or_try_init(|| async {
                let existing = self
                    .store
                    .load(&self.alias)
                    .map_err(|e| VaultError::KeyUnavailable(e.to_string()))?;

                // Intermediate key material is wiped on every path once the
                // bytes live inside `MasterKey`.
                match existing {
                    Some(mut bytes) => {
                        if bytes.len() != KEY_LEN {
                            bytes.zeroize();
                            return Err(VaultError::KeyUnavailable(
                                "malformed key material".into(),
                            ));
                        }
                        let mut raw = [0u8; KEY_LEN];
                        raw.copy_from_slice(&bytes);
                        bytes.zeroize();
                        let key = MasterKey::from_bytes(raw);
                        raw.zeroize();
                        Ok(key)
                    }
                    None => {
                        let mut raw = crypto::generate_random_key()?;
                        let stored = self.store.store(&self.alias, &raw);
                        let key = MasterKey::from_bytes(raw);
                        raw.zeroize();
                        stored.map_err(|e| VaultError::KeyUnavailable(e.to_string()))?;
                        Ok(key)
                    }
                }
            })
            .await
    }
}

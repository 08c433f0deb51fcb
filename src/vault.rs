//! Vault assembly and sessions.
//!
//! Wires the explicitly constructed collaborators together — key store,
//! authentication gate, preview decoder — and hands out partition-scoped
//! sessions. There are no process-wide singletons: everything a pipeline
//! needs arrives through its session.
//!
//! A session is the only handle to vault contents, and a session exists
//! only after the authentication gate reports success for a selection.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::auth::{AuthGate, AuthOutcome};
use crate::catalog::{PartitionKind, VaultCatalog, VaultFileRecord};
use crate::codec::CipherCodec;
use crate::detector::VaultSelection;
use crate::error::VaultError;
use crate::ingest::{self, SourceResource};
use crate::keys::{KeyCustodian, SecureKeyStore};
use crate::retrieve::{self, PlaintextGuard};
use crate::thumbnail::PreviewDecoder;

/// Alias under which the vault key lives in the secure store.
const KEY_ALIAS: &str = "calcvault-master";

/// On-disk layout of one vault root.
#[derive(Debug)]
pub struct VaultLayout {
    /// Permanent encrypted-files area.
    pub encrypted_dir: PathBuf,
    /// Encrypted previews.
    pub thumbnail_dir: PathBuf,
    /// Private scratch area for plaintext with bounded lifetime.
    pub scratch_dir: PathBuf,
    /// Catalog document.
    pub catalog_path: PathBuf,
}

impl VaultLayout {
    fn create_under(root: &Path) -> io::Result<Self> {
        let layout = Self {
            encrypted_dir: root.join(".secure"),
            thumbnail_dir: root.join(".thumbnails"),
            scratch_dir: root.join("scratch"),
            catalog_path: root.join("catalog.json"),
        };
        std::fs::create_dir_all(&layout.encrypted_dir)?;
        std::fs::create_dir_all(&layout.thumbnail_dir)?;
        std::fs::create_dir_all(&layout.scratch_dir)?;
        Ok(layout)
    }
}

/// The assembled vault subsystem.
pub struct Vault {
    custodian: Arc<KeyCustodian>,
    codec: CipherCodec,
    catalog: Arc<VaultCatalog>,
    layout: Arc<VaultLayout>,
    gate: Arc<dyn AuthGate>,
    decoder: Arc<dyn PreviewDecoder>,
}

impl Vault {
    /// Open a vault rooted at `root`, creating its directory layout and
    /// catalog as needed. Collaborators are passed in, not looked up.
    pub fn open(
        root: impl AsRef<Path>,
        key_store: Box<dyn SecureKeyStore>,
        gate: Arc<dyn AuthGate>,
        decoder: Arc<dyn PreviewDecoder>,
    ) -> Result<Self, VaultError> {
        let layout = VaultLayout::create_under(root.as_ref()).map_err(VaultError::SourceWrite)?;
        let catalog = VaultCatalog::open(&layout.catalog_path)?;
        let custodian = Arc::new(KeyCustodian::new(key_store, KEY_ALIAS));
        let codec = CipherCodec::new(Arc::clone(&custodian));

        Ok(Self {
            custodian,
            codec,
            catalog: Arc::new(catalog),
            layout: Arc::new(layout),
            gate,
            decoder,
        })
    }

    /// Run the authentication gate for a vault selection.
    ///
    /// Only a `Success` outcome mints a session; a mismatch and a hard
    /// gate error surface as distinct errors so the caller can offer
    /// retry or cancel accordingly.
    pub async fn unlock(&self, selection: VaultSelection) -> Result<VaultSession, VaultError> {
        match self.gate.verify().await {
            AuthOutcome::Success => {
                let partition = PartitionKind::from(selection);
                // The log stream never learns which partition unlocked.
                debug!("session opened");
                Ok(VaultSession {
                    partition,
                    custodian: Arc::clone(&self.custodian),
                    codec: self.codec.clone(),
                    catalog: Arc::clone(&self.catalog),
                    layout: Arc::clone(&self.layout),
                    decoder: Arc::clone(&self.decoder),
                })
            }
            AuthOutcome::Failed => Err(VaultError::AuthFailed),
            AuthOutcome::Error(reason) => Err(VaultError::AuthError(reason)),
        }
    }
}

/// An authenticated handle to one partition.
///
/// All operations are scoped to the session's partition; records from the
/// other partition are invisible and untouchable through it.
pub struct VaultSession {
    partition: PartitionKind,
    custodian: Arc<KeyCustodian>,
    codec: CipherCodec,
    catalog: Arc<VaultCatalog>,
    layout: Arc<VaultLayout>,
    decoder: Arc<dyn PreviewDecoder>,
}

impl VaultSession {
    pub fn partition(&self) -> PartitionKind {
        self.partition
    }

    /// Ingest an external resource into this partition.
    pub async fn ingest(&self, source: SourceResource) -> Result<VaultFileRecord, VaultError> {
        ingest::run(
            &self.custodian,
            &self.codec,
            &self.catalog,
            &self.decoder,
            &self.layout,
            source,
            self.partition,
        )
        .await
    }

    /// Look up a record by id within this partition.
    pub fn get(&self, id: u64) -> Result<VaultFileRecord, VaultError> {
        let record = self
            .catalog
            .get_by_id(id)
            .ok_or(VaultError::RecordNotFound(id))?;
        self.guard_partition(&record)?;
        Ok(record)
    }

    /// Decrypt a record into a scoped ephemeral plaintext file.
    pub async fn open_decrypted(
        &self,
        record: &VaultFileRecord,
    ) -> Result<PlaintextGuard, VaultError> {
        self.guard_partition(record)?;
        retrieve::open_scoped(&self.codec, record, &self.layout.scratch_dir).await
    }

    /// Decrypt a record, hand the plaintext path to `f`, and delete the
    /// plaintext when `f` finishes — also when the surrounding task is
    /// cancelled mid-way, since cleanup rides on the guard's drop.
    pub async fn with_decrypted<F, Fut, T>(
        &self,
        record: &VaultFileRecord,
        f: F,
    ) -> Result<T, VaultError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.open_decrypted(record).await?;
        let output = f(guard.path().to_path_buf()).await;
        drop(guard);
        Ok(output)
    }

    /// Delete a record: ciphertext, thumbnail ciphertext, and catalog row
    /// as one logical operation.
    ///
    /// Files go first; if one cannot be removed the row stays, the error
    /// surfaces, and the operation can be retried (a missing file is
    /// tolerated, since that is exactly the partial state a retry mends).
    pub async fn delete(&self, record: &VaultFileRecord) -> Result<(), VaultError> {
        self.guard_partition(record)?;

        remove_tolerant(&record.encrypted_path).await?;
        if let Some(thumb) = &record.thumbnail_encrypted_path {
            remove_tolerant(thumb).await?;
        }
        self.catalog.delete(record.id)?;
        Ok(())
    }

    /// Delete every record in this partition.
    ///
    /// Files first, then the rows in one sweep; a file that cannot be
    /// removed aborts before any row disappears, so the operation stays
    /// retryable like [`delete`](Self::delete).
    pub async fn purge(&self) -> Result<(), VaultError> {
        for record in self.list() {
            remove_tolerant(&record.encrypted_path).await?;
            if let Some(thumb) = &record.thumbnail_encrypted_path {
                remove_tolerant(thumb).await?;
            }
        }
        self.catalog.delete_all(self.partition)?;
        Ok(())
    }

    /// Snapshot of this partition, newest first.
    pub fn list(&self) -> Vec<VaultFileRecord> {
        self.catalog.list(self.partition)
    }

    /// Live listing of this partition.
    pub fn watch(&self) -> watch::Receiver<Vec<VaultFileRecord>> {
        self.catalog.watch(self.partition)
    }

    pub fn count(&self) -> usize {
        self.catalog.count(self.partition)
    }

    /// Live item count for this partition.
    pub fn watch_count(&self) -> watch::Receiver<usize> {
        self.catalog.watch_count(self.partition)
    }

    fn guard_partition(&self, record: &VaultFileRecord) -> Result<(), VaultError> {
        if record.partition == self.partition {
            Ok(())
        } else {
            Err(VaultError::WrongPartition)
        }
    }
}

async fn remove_tolerant(path: &Path) -> Result<(), VaultError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VaultError::SourceWrite(e)),
    }
}

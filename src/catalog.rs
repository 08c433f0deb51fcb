//! Durable vault catalog.
//!
//! One row per stored item, partitioned by vault identity. The catalog owns
//! rows only: it never touches ciphertext files — deleting those is the
//! orchestration layer's responsibility, since the catalog has no authority
//! over filesystem layout.
//!
//! Rows persist as a single JSON document rewritten atomically on every
//! mutation. Listings are scoped to one partition by construction; there is
//! no API that returns rows across partitions. Each partition additionally
//! exposes a live view through a watch channel: subscribers see inserts and
//! deletes pushed to them without re-polling.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// The two isolated vault partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    Real,
    Decoy,
}

impl PartitionKind {
    fn index(self) -> usize {
        match self {
            Self::Real => 0,
            Self::Decoy => 1,
        }
    }
}

/// Media classification, fixed at ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Pdf,
    Document,
    Other,
}

impl MediaKind {
    /// Classify a declared content-type string at the ingestion boundary.
    /// Free-form strings from the source provider are validated into the
    /// closed enum here and nowhere else.
    pub fn classify(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            Self::Image
        } else if content_type.starts_with("video/") {
            Self::Video
        } else if content_type.starts_with("audio/") {
            Self::Audio
        } else if content_type.contains("pdf") {
            Self::Pdf
        } else if content_type.contains("document") || content_type.contains("text") {
            Self::Document
        } else {
            Self::Other
        }
    }

    /// Whether a preview can be derived for this kind.
    pub fn previewable(self) -> bool {
        matches!(self, Self::Image | Self::Video)
    }
}

/// One stored item. Immutable after creation; the partition in particular
/// never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultFileRecord {
    /// Unique, monotonically increasing surrogate key.
    pub id: u64,
    /// Opaque reference to the original source location. Audit only.
    pub original_reference: String,
    /// Location of the ciphertext container.
    pub encrypted_path: PathBuf,
    /// User-facing file name. Not secret.
    pub display_name: String,
    pub kind: MediaKind,
    /// Present only if a preview could be derived.
    pub thumbnail_encrypted_path: Option<PathBuf>,
    pub added_at: DateTime<Utc>,
    pub partition: PartitionKind,
}

/// Everything the ingestion pipeline knows about a row before the catalog
/// assigns its id and timestamp.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub original_reference: String,
    pub encrypted_path: PathBuf,
    pub display_name: String,
    pub kind: MediaKind,
    pub thumbnail_encrypted_path: Option<PathBuf>,
    pub partition: PartitionKind,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogState {
    next_id: u64,
    records: Vec<VaultFileRecord>,
}

impl CatalogState {
    /// Partition snapshot, newest first; ties break by id descending.
    fn snapshot(&self, partition: PartitionKind) -> Vec<VaultFileRecord> {
        let mut rows: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.partition == partition)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.added_at.cmp(&a.added_at).then(b.id.cmp(&a.id)));
        rows
    }
}

struct PartitionFeed {
    listing: watch::Sender<Vec<VaultFileRecord>>,
    count: watch::Sender<usize>,
}

/// Durable mapping from file id to metadata, partitioned by vault identity.
pub struct VaultCatalog {
    path: PathBuf,
    state: Mutex<CatalogState>,
    feeds: [PartitionFeed; 2],
}

impl VaultCatalog {
    /// Open (or create) the catalog document at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, VaultError> {
        let path = path.into();
        let mut state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<CatalogState>(&bytes)
                .map_err(|e| VaultError::Catalog(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CatalogState::default(),
            Err(e) => return Err(VaultError::Catalog(e.to_string())),
        };

        // Ids stay monotonic even if the persisted counter lags the rows.
        let max_id = state.records.iter().map(|r| r.id).max().unwrap_or(0);
        state.next_id = state.next_id.max(max_id + 1);

        let feeds = [PartitionKind::Real, PartitionKind::Decoy].map(|p| {
            let rows = state.snapshot(p);
            PartitionFeed {
                count: watch::channel(rows.len()).0,
                listing: watch::channel(rows).0,
            }
        });

        Ok(Self {
            path,
            state: Mutex::new(state),
            feeds,
        })
    }

    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write `state` to disk atomically, then commit it and push the
    /// affected partition feeds. The in-memory state never gets ahead of
    /// the durable document.
    fn commit(
        &self,
        guard: &mut MutexGuard<'_, CatalogState>,
        state: CatalogState,
        touched: &[PartitionKind],
    ) -> Result<(), VaultError> {
        let bytes =
            serde_json::to_vec_pretty(&state).map_err(|e| VaultError::Catalog(e.to_string()))?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| VaultError::Catalog(e.to_string()))?;
        std::io::Write::write_all(&mut tmp, &bytes)
            .map_err(|e| VaultError::Catalog(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| VaultError::Catalog(e.to_string()))?;

        **guard = state;
        for &p in touched {
            let rows = guard.snapshot(p);
            let feed = &self.feeds[p.index()];
            feed.count.send_replace(rows.len());
            feed.listing.send_replace(rows);
        }
        Ok(())
    }

    /// Insert a new row, assigning its id and timestamp. Never called
    /// directly by applications — records are created by the ingestion
    /// pipeline.
    pub fn insert(&self, draft: RecordDraft) -> Result<VaultFileRecord, VaultError> {
        let mut guard = self.lock();
        let mut state = guard.clone();

        let record = VaultFileRecord {
            id: state.next_id,
            original_reference: draft.original_reference,
            encrypted_path: draft.encrypted_path,
            display_name: draft.display_name,
            kind: draft.kind,
            thumbnail_encrypted_path: draft.thumbnail_encrypted_path,
            added_at: Utc::now(),
            partition: draft.partition,
        };
        state.next_id += 1;
        state.records.push(record.clone());

        self.commit(&mut guard, state, &[record.partition])?;
        Ok(record)
    }

    /// Look up a row by id.
    pub fn get_by_id(&self, id: u64) -> Option<VaultFileRecord> {
        self.lock().records.iter().find(|r| r.id == id).cloned()
    }

    /// Snapshot of one partition, ordered `added_at` descending, ties by
    /// id descending.
    pub fn list(&self, partition: PartitionKind) -> Vec<VaultFileRecord> {
        self.lock().snapshot(partition)
    }

    /// Live view of one partition's listing. The receiver holds the
    /// current snapshot and is notified on every insert or delete touching
    /// the partition.
    pub fn watch(&self, partition: PartitionKind) -> watch::Receiver<Vec<VaultFileRecord>> {
        self.feeds[partition.index()].listing.subscribe()
    }

    /// Number of rows in one partition.
    pub fn count(&self, partition: PartitionKind) -> usize {
        *self.feeds[partition.index()].count.borrow()
    }

    /// Live row count for one partition.
    pub fn watch_count(&self, partition: PartitionKind) -> watch::Receiver<usize> {
        self.feeds[partition.index()].count.subscribe()
    }

    /// Remove one row. Does **not** delete the referenced ciphertext files;
    /// that belongs to the caller.
    pub fn delete(&self, id: u64) -> Result<VaultFileRecord, VaultError> {
        let mut guard = self.lock();
        let mut state = guard.clone();

        let pos = state
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or(VaultError::RecordNotFound(id))?;
        let removed = state.records.remove(pos);

        self.commit(&mut guard, state, &[removed.partition])?;
        Ok(removed)
    }

    /// Remove every row in one partition, returning the removed rows so
    /// the caller can free their ciphertext.
    pub fn delete_all(&self, partition: PartitionKind) -> Result<Vec<VaultFileRecord>, VaultError> {
        let mut guard = self.lock();
        let mut state = guard.clone();

        let (removed, kept): (Vec<_>, Vec<_>) = state
            .records
            .into_iter()
            .partition(|r| r.partition == partition);
        state.records = kept;

        self.commit(&mut guard, state, &[partition])?;
        Ok(removed)
    }
}

//! Ingestion pipeline.
//!
//! Orchestrates: copy source into private scratch, classify, encrypt into
//! the permanent area, derive an encrypted thumbnail, register in the
//! catalog, best-effort erase the source. Each checkpoint fails
//! independently with its own error; only thumbnail derivation is
//! non-fatal. The scratch copy is erased on every path, success or not.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::catalog::{MediaKind, PartitionKind, RecordDraft, VaultCatalog, VaultFileRecord};
use crate::codec::CipherCodec;
use crate::crypto;
use crate::error::VaultError;
use crate::keys::KeyCustodian;
use crate::thumbnail::{self, PreviewDecoder};
use crate::vault::VaultLayout;

/// Best-effort removal of the original source. The source system may
/// refuse; the pipeline tolerates that silently.
pub type SourceRemover = Box<dyn FnOnce() -> io::Result<()> + Send>;

/// A readable external resource offered for ingestion.
pub struct SourceResource {
    /// Suggested user-facing name.
    pub display_name: String,
    /// Declared content type, classified at the pipeline boundary.
    pub content_type: String,
    /// Opaque reference to the source location, kept for audit only.
    pub reference: String,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub remover: Option<SourceRemover>,
}

impl SourceResource {
    /// Wrap a local file as a source. The remover deletes the file after
    /// successful ingestion.
    pub async fn from_path(
        path: impl Into<PathBuf>,
        content_type: impl Into<String>,
    ) -> io::Result<Self> {
        let path = path.into();
        let file = tokio::fs::File::open(&path).await?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown_file".to_string());
        let reference = path.to_string_lossy().into_owned();
        let remove_target = path.clone();
        Ok(Self {
            display_name,
            content_type: content_type.into(),
            reference,
            reader: Box::new(file),
            remover: Some(Box::new(move || std::fs::remove_file(remove_target))),
        })
    }
}

/// Run one ingestion into `partition`.
pub(crate) async fn run(
    custodian: &KeyCustodian,
    codec: &CipherCodec,
    catalog: &VaultCatalog,
    decoder: &Arc<dyn PreviewDecoder>,
    layout: &VaultLayout,
    mut source: SourceResource,
    partition: PartitionKind,
) -> Result<VaultFileRecord, VaultError> {
    // Key first: an unavailable key store must not leave a scratch copy,
    // ciphertext, or catalog row behind.
    custodian.ensure_key().await?;

    // 1. Private scratch copy, erased on every exit path via TempPath.
    let scratch = tempfile::Builder::new()
        .prefix("ingest-")
        .tempfile_in(&layout.scratch_dir)
        .map_err(VaultError::SourceWrite)?;
    let (scratch_file, scratch_path) = scratch.into_parts();
    copy_source(&mut *source.reader, scratch_file).await?;

    let kind = MediaKind::classify(&source.content_type);

    // 2. Encrypt into the permanent area. Failure aborts the whole
    //    ingestion; nothing appears at the destination.
    let token = crypto::random_token()?;
    let encrypted_path = layout.encrypted_dir.join(format!("obj-{}", token));
    let mut plain = tokio::fs::File::open(&scratch_path)
        .await
        .map_err(VaultError::SourceRead)?;
    codec.encrypt_stream(&mut plain, &encrypted_path).await?;

    // 3. Thumbnail, non-fatal.
    let thumbnail_encrypted_path = thumbnail::derive_encrypted_preview(
        decoder,
        codec,
        &scratch_path,
        kind,
        &layout.thumbnail_dir,
    )
    .await;

    // 4. Register. A failed insert must not leave orphaned ciphertext.
    let draft = RecordDraft {
        original_reference: source.reference,
        encrypted_path: encrypted_path.clone(),
        display_name: source.display_name,
        kind,
        thumbnail_encrypted_path: thumbnail_encrypted_path.clone(),
        partition,
    };
    let record = match catalog.insert(draft) {
        Ok(record) => record,
        Err(e) => {
            discard(&encrypted_path).await;
            if let Some(thumb) = &thumbnail_encrypted_path {
                discard(thumb).await;
            }
            return Err(e);
        }
    };

    // 5. Best-effort source removal. Never rolls anything back; the source
    //    system refusing deletion is expected on some platforms. The
    //    encrypted copy is not re-verified before this — a deliberate
    //    policy choice matching the observed behavior of gallery vaults.
    if let Some(remover) = source.remover.take() {
        if let Err(e) = remover() {
            debug!(error = %e, "source removal refused");
        }
    }

    debug!(id = record.id, "ingested");
    Ok(record)
}

async fn copy_source<R>(reader: &mut R, scratch: std::fs::File) -> Result<(), VaultError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut out = tokio::fs::File::from_std(scratch);
    let mut buf = vec![0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await.map_err(VaultError::SourceRead)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])
            .await
            .map_err(VaultError::SourceWrite)?;
    }
    out.flush().await.map_err(VaultError::SourceWrite)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(error = %e, path = %path.display(), "rollback removal failed");
    }
}

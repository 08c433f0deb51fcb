use std::io;
use std::path::Path;
use std::sync::Arc;

use calcvault::auth::{AuthFuture, AuthGate, AuthOutcome};
use calcvault::catalog::{MediaKind, PartitionKind};
use calcvault::detector::VaultSelection;
use calcvault::error::VaultError;
use calcvault::ingest::SourceResource;
use calcvault::keys::{FileKeyStore, SecureKeyStore};
use calcvault::thumbnail::{NoPreviewDecoder, PreviewDecoder, PreviewError};
use calcvault::Vault;

struct AllowGate;

impl AuthGate for AllowGate {
    fn verify(&self) -> AuthFuture<'_> {
        Box::pin(async { AuthOutcome::Success })
    }
}

struct FakeDecoder;

impl PreviewDecoder for FakeDecoder {
    fn probe(&self, _path: &Path, _kind: MediaKind) -> Result<(u32, u32), PreviewError> {
        Ok((4096, 3072))
    }

    fn render(
        &self,
        path: &Path,
        _kind: MediaKind,
        sample_size: u32,
    ) -> Result<Vec<u8>, PreviewError> {
        let original = std::fs::read(path).map_err(|e| PreviewError::new(e.to_string()))?;
        let mut preview = format!("preview@{}:", sample_size).into_bytes();
        preview.extend(original.into_iter().take(16));
        Ok(preview)
    }
}

fn open_vault(root: &Path, decoder: Arc<dyn PreviewDecoder>) -> Vault {
    Vault::open(
        root,
        Box::new(FileKeyStore::new(root.join("keystore"))),
        Arc::new(AllowGate),
        decoder,
    )
    .unwrap()
}

#[tokio::test]
async fn test_ingest_image_scenario() {
    // Scenario: ingest "vacation.jpg" (image/jpeg) into the real
    // partition. The record classifies as an image, carries a thumbnail,
    // and lists first.
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("vacation.jpg");
    std::fs::write(&source_path, b"jpeg bytes of a beach").unwrap();

    let vault = open_vault(dir.path(), Arc::new(FakeDecoder));
    let session = vault.unlock(VaultSelection::Real).await.unwrap();

    let earlier = session
        .ingest(
            SourceResource::from_path(dir.path().join("vacation.jpg"), "image/jpeg")
                .await
                .map(|mut s| {
                    // Keep the fixture; this test checks classification,
                    // not source removal.
                    s.remover = None;
                    s
                })
                .unwrap(),
        )
        .await
        .unwrap();
    let record = session
        .ingest(SourceResource::from_path(&source_path, "image/jpeg").await.unwrap())
        .await
        .unwrap();

    assert_eq!(record.kind, MediaKind::Image);
    assert_eq!(record.partition, PartitionKind::Real);
    assert_eq!(record.display_name, "vacation.jpg");
    assert!(record.thumbnail_encrypted_path.is_some());
    assert!(record.encrypted_path.exists());
    // Best-effort source removal succeeded for a plain file.
    assert!(!source_path.exists());
    // Newest first.
    let listed = session.list();
    assert_eq!(listed.first().map(|r| r.id), Some(record.id));
    assert!(listed.iter().any(|r| r.id == earlier.id));

    // The stored content decrypts back to the original bytes.
    let content = session
        .with_decrypted(&record, |path| async move { std::fs::read(path) })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(content, b"jpeg bytes of a beach");
}

#[tokio::test]
async fn test_thumbnail_failure_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path(), Arc::new(NoPreviewDecoder));
    let session = vault.unlock(VaultSelection::Real).await.unwrap();

    let record = session
        .ingest(SourceResource {
            display_name: "clip.mp4".into(),
            content_type: "video/mp4".into(),
            reference: "mem://clip".into(),
            reader: Box::new(io::Cursor::new(b"video bytes".to_vec())),
            remover: None,
        })
        .await
        .unwrap();

    assert_eq!(record.kind, MediaKind::Video);
    assert!(record.thumbnail_encrypted_path.is_none());
}

#[tokio::test]
async fn test_document_kinds_get_no_thumbnail() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path(), Arc::new(FakeDecoder));
    let session = vault.unlock(VaultSelection::Decoy).await.unwrap();

    let record = session
        .ingest(SourceResource {
            display_name: "notes.pdf".into(),
            content_type: "application/pdf".into(),
            reference: "mem://notes".into(),
            reader: Box::new(io::Cursor::new(b"%PDF".to_vec())),
            remover: None,
        })
        .await
        .unwrap();

    assert_eq!(record.kind, MediaKind::Pdf);
    assert!(record.thumbnail_encrypted_path.is_none());
}

struct DeniedStore;

impl SecureKeyStore for DeniedStore {
    fn load(&self, _alias: &str) -> io::Result<Option<Vec<u8>>> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
    }
    fn store(&self, _alias: &str, _key: &[u8]) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
    }
}

#[tokio::test]
async fn test_key_unavailable_leaves_nothing_behind() {
    // Scenario: key store access denied. Ingestion and retrieval surface
    // KeyUnavailable without partial catalog rows or ciphertext files.
    let dir = tempfile::tempdir().unwrap();
    let vault = Vault::open(
        dir.path(),
        Box::new(DeniedStore),
        Arc::new(AllowGate),
        Arc::new(NoPreviewDecoder),
    )
    .unwrap();
    let session = vault.unlock(VaultSelection::Real).await.unwrap();

    let result = session
        .ingest(SourceResource {
            display_name: "a.txt".into(),
            content_type: "text/plain".into(),
            reference: "mem://a".into(),
            reader: Box::new(io::Cursor::new(b"data".to_vec())),
            remover: None,
        })
        .await;

    assert!(matches!(result, Err(VaultError::KeyUnavailable(_))));
    assert_eq!(session.count(), 0);
    assert_eq!(
        std::fs::read_dir(dir.path().join(".secure")).unwrap().count(),
        0
    );
    assert_eq!(
        std::fs::read_dir(dir.path().join("scratch")).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn test_source_read_failure_aborts_cleanly() {
    struct BrokenReader;
    impl tokio::io::AsyncRead for BrokenReader {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            std::task::Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "unplugged")))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path(), Arc::new(NoPreviewDecoder));
    let session = vault.unlock(VaultSelection::Real).await.unwrap();

    let result = session
        .ingest(SourceResource {
            display_name: "a.bin".into(),
            content_type: "application/octet-stream".into(),
            reference: "mem://broken".into(),
            reader: Box::new(BrokenReader),
            remover: None,
        })
        .await;

    assert!(matches!(result, Err(VaultError::SourceRead(_))));
    assert_eq!(session.count(), 0);
    assert_eq!(
        std::fs::read_dir(dir.path().join(".secure")).unwrap().count(),
        0
    );
    assert_eq!(
        std::fs::read_dir(dir.path().join("scratch")).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn test_concurrent_retrievals_are_independent() {
    // Two concurrent retrievals of the same record each get their own
    // ephemeral copy; dropping one does not affect the other.
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path(), Arc::new(NoPreviewDecoder));
    let session = vault.unlock(VaultSelection::Real).await.unwrap();

    let record = session
        .ingest(SourceResource {
            display_name: "shared.txt".into(),
            content_type: "text/plain".into(),
            reference: "mem://shared".into(),
            reader: Box::new(io::Cursor::new(b"shared plaintext".to_vec())),
            remover: None,
        })
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        session.open_decrypted(&record),
        session.open_decrypted(&record)
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert_ne!(a.path(), b.path(), "scratch files collided");

    drop(a);
    // The second copy is intact after the first is deleted.
    assert_eq!(std::fs::read(b.path()).unwrap(), b"shared plaintext");
}

#[tokio::test]
async fn test_ephemeral_plaintext_removed_after_scope() {
    let dir = tempfile::tempdir().unwrap();
    let vault = open_vault(dir.path(), Arc::new(NoPreviewDecoder));
    let session = vault.unlock(VaultSelection::Real).await.unwrap();

    let record = session
        .ingest(SourceResource {
            display_name: "a.txt".into(),
            content_type: "text/plain".into(),
            reference: "mem://a".into(),
            reader: Box::new(io::Cursor::new(b"ephemeral".to_vec())),
            remover: None,
        })
        .await
        .unwrap();

    let seen = session
        .with_decrypted(&record, |path| async move {
            assert_eq!(std::fs::read(&path).unwrap(), b"ephemeral");
            path
        })
        .await
        .unwrap();
    assert!(!seen.exists(), "plaintext survived its scope");

    // Cancellation mid-retrieval also cleans up: the guard's drop runs
    // when the task is aborted.
    let guard = session.open_decrypted(&record).await.unwrap();
    let path = guard.path().to_path_buf();
    let task = tokio::spawn(async move {
        let _held = guard;
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    });
    task.abort();
    let _ = task.await;
    assert!(!path.exists(), "plaintext survived task cancellation");
}

#[tokio::test]
async fn test_unlock_outcomes_are_distinct() {
    struct RefuseGate(AuthOutcome);
    impl AuthGate for RefuseGate {
        fn verify(&self) -> AuthFuture<'_> {
            let outcome = self.0.clone();
            Box::pin(async move { outcome })
        }
    }

    let dir = tempfile::tempdir().unwrap();

    let vault = Vault::open(
        dir.path(),
        Box::new(FileKeyStore::new(dir.path().join("keystore"))),
        Arc::new(RefuseGate(AuthOutcome::Failed)),
        Arc::new(NoPreviewDecoder),
    )
    .unwrap();
    assert!(matches!(
        vault.unlock(VaultSelection::Real).await,
        Err(VaultError::AuthFailed)
    ));

    let vault = Vault::open(
        dir.path(),
        Box::new(FileKeyStore::new(dir.path().join("keystore"))),
        Arc::new(RefuseGate(AuthOutcome::Error("sensor offline".into()))),
        Arc::new(NoPreviewDecoder),
    )
    .unwrap();
    match vault.unlock(VaultSelection::Decoy).await {
        Err(VaultError::AuthError(reason)) => assert_eq!(reason, "sensor offline"),
        other => panic!("expected AuthError, got {:?}", other.err()),
    }
}

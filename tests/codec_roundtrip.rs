use std::sync::Arc;

use calcvault::codec::CipherCodec;
use calcvault::error::VaultError;
use calcvault::keys::{FileKeyStore, KeyCustodian};

fn codec_in(dir: &std::path::Path) -> CipherCodec {
    let store = Box::new(FileKeyStore::new(dir.join("keys")));
    CipherCodec::new(Arc::new(KeyCustodian::new(store, "test")))
}

#[tokio::test]
async fn test_roundtrip_across_sizes() {
    // Property: for all byte sequences b, decrypt(encrypt(b)) == b.
    // Exercised at the chunking boundaries, where off-by-one bugs live.
    let dir = tempfile::tempdir().unwrap();
    let codec = codec_in(dir.path());

    let chunk = 64 * 1024;
    for (name, len) in [
        ("empty", 0usize),
        ("one", 1),
        ("chunk-minus-one", chunk - 1),
        ("chunk", chunk),
        ("chunk-plus-one", chunk + 1),
        ("two-and-a-half", chunk * 2 + chunk / 2),
    ] {
        let plaintext: Vec<u8> = (0..len).map(|i| (i % 255) as u8).collect();
        let container = dir.path().join(name);

        codec.encrypt_bytes(&plaintext, &container).await.unwrap();
        let scratch = codec
            .decrypt_to_scratch(&container, dir.path(), name)
            .await
            .unwrap();

        assert_eq!(
            std::fs::read(&scratch).unwrap(),
            plaintext,
            "roundtrip mismatch for {}",
            name
        );
    }
}

#[tokio::test]
async fn test_iv_freshness() {
    // Property: encrypting the same plaintext twice with the same key
    // produces containers with different nonce prefixes (and, with GCM,
    // entirely different bodies).
    let dir = tempfile::tempdir().unwrap();
    let codec = codec_in(dir.path());

    let plaintext = vec![42u8; 1024];
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    codec.encrypt_bytes(&plaintext, &a).await.unwrap();
    codec.encrypt_bytes(&plaintext, &b).await.unwrap();

    let bytes_a = std::fs::read(&a).unwrap();
    let bytes_b = std::fs::read(&b).unwrap();
    assert_ne!(&bytes_a[..12], &bytes_b[..12], "file nonces collided");
    assert_ne!(bytes_a, bytes_b);
}

#[tokio::test]
async fn test_corrupted_container_rejected_whole() {
    // A flipped ciphertext byte fails the whole operation; the caller
    // never receives partial plaintext, and the scratch area stays clean.
    let dir = tempfile::tempdir().unwrap();
    let scratch_dir = dir.path().join("scratch");
    std::fs::create_dir_all(&scratch_dir).unwrap();
    let codec = codec_in(dir.path());

    let container = dir.path().join("obj");
    codec
        .encrypt_bytes(&vec![7u8; 100_000], &container)
        .await
        .unwrap();

    let mut bytes = std::fs::read(&container).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xff;
    std::fs::write(&container, &bytes).unwrap();

    let result = codec.decrypt_to_scratch(&container, &scratch_dir, "t").await;
    assert!(matches!(result, Err(VaultError::CipherFailure)));
    assert_eq!(
        std::fs::read_dir(&scratch_dir).unwrap().count(),
        0,
        "failed decryption left scratch files behind"
    );
}

#[tokio::test]
async fn test_wrong_key_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let container = dir.path().join("obj");

    codec_in(&dir.path().join("one"))
        .encrypt_bytes(b"secret", &container)
        .await
        .unwrap();

    let other = codec_in(&dir.path().join("two"));
    let result = other.decrypt_to_scratch(&container, dir.path(), "t").await;
    assert!(matches!(result, Err(VaultError::CipherFailure)));
}

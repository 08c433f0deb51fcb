//! Low-level cryptographic operations.
//!
//! This module is one of exactly two places in the crate that import `ring`
//! directly (the other is `keys`). All other modules perform encryption and
//! decryption exclusively through the chunk primitives exposed here.
//!
//! Primitive choices:
//! - **Cipher**: AES-256-GCM (authenticated encryption)
//! - **Nonce**: 96-bit (12 bytes), generated fresh per file and per chunk
//!   via `SystemRandom`
//! - **Key size**: 256 bits (32 bytes)
//!
//! ## Ciphertext container layout
//!
//! A stored file is a single contiguous container:
//!
//! ```text
//! [ file nonce (12 bytes) ][ chunk 0 ][ chunk 1 ] ...
//! ```
//!
//! where each chunk covers up to 64 KiB of plaintext:
//!
//! ```text
//! [ chunk nonce (12 bytes) ][ ciphertext + GCM tag ]
//! ```
//!
//! Every chunk is bound to its container and position through the AAD:
//! file nonce, big-endian chunk index, and a final-chunk flag. A chunk
//! moved between files, reordered, or cut off the end of a container fails
//! authentication. Encryption always emits at least one chunk, so an empty
//! container body is itself a decryption error rather than an empty file.

use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::VaultError;

/// The AEAD algorithm used throughout calcvault.
const ALGORITHM: &aead::Algorithm = &AES_256_GCM;

/// Size of a nonce in bytes (96 bits). The file nonce written at the head
/// of every container has this width, as does each per-chunk nonce.
pub const NONCE_LEN: usize = 12;

/// Size of the symmetric key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Size of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Maximum plaintext bytes per chunk. Bounds memory use when streaming
/// large media files through the codec.
pub const CHUNK_PLAINTEXT_SIZE: usize = 64 * 1024;

/// On-disk size of a full chunk (nonce + ciphertext + tag).
pub const CHUNK_ENCRYPTED_SIZE: usize = NONCE_LEN + CHUNK_PLAINTEXT_SIZE + TAG_LEN;

/// Fill a buffer from `SystemRandom` — the only source of randomness in
/// the crate.
fn fill_random(buf: &mut [u8]) -> Result<(), VaultError> {
    let rng = SystemRandom::new();
    rng.fill(buf).map_err(|_| VaultError::RandomnessFailure)
}

/// Generate the fresh random nonce written at the head of a container.
/// One per encryption call; never reused across files.
pub(crate) fn generate_file_nonce() -> Result<[u8; NONCE_LEN], VaultError> {
    let mut buf = [0u8; NONCE_LEN];
    fill_random(&mut buf)?;
    Ok(buf)
}

/// Generate a cryptographically secure random key.
///
/// This is the only function in the crate that produces raw key material
/// from scratch. It is used by the key custodian on first use.
pub(crate) fn generate_random_key() -> Result<[u8; KEY_LEN], VaultError> {
    let mut key = [0u8; KEY_LEN];
    fill_random(&mut key)?;
    Ok(key)
}

/// A short random hex token for naming stored objects. Collision of two
/// 64-bit tokens within one vault directory is not a realistic concern.
pub(crate) fn random_token() -> Result<String, VaultError> {
    let mut buf = [0u8; 8];
    fill_random(&mut buf)?;
    use std::fmt::Write;
    let mut out = String::with_capacity(16);
    for b in buf {
        let _ = write!(out, "{:02x}", b);
    }
    Ok(out)
}

/// Build the AAD that pins a chunk to its container and position:
/// `file_nonce || index (u64 BE) || last_flag (1 byte)`.
fn chunk_aad(file_nonce: &[u8; NONCE_LEN], index: u64, last: bool) -> [u8; NONCE_LEN + 9] {
    let mut aad = [0u8; NONCE_LEN + 9];
    aad[..NONCE_LEN].copy_from_slice(file_nonce);
    aad[NONCE_LEN..NONCE_LEN + 8].copy_from_slice(&index.to_be_bytes());
    aad[NONCE_LEN + 8] = u8::from(last);
    aad
}

fn make_key(key_bytes: &[u8; KEY_LEN]) -> Result<LessSafeKey, VaultError> {
    let unbound = UnboundKey::new(ALGORITHM, key_bytes).map_err(|_| VaultError::CipherFailure)?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt one chunk of plaintext.
///
/// Returns the chunk nonce prepended to ciphertext and tag. The plaintext
/// may be shorter than [`CHUNK_PLAINTEXT_SIZE`] only when `last` is true
/// (the final chunk), or empty when the whole input is empty.
pub(crate) fn seal_chunk(
    key_bytes: &[u8; KEY_LEN],
    file_nonce: &[u8; NONCE_LEN],
    index: u64,
    last: bool,
    plaintext: &[u8],
) -> Result<Vec<u8>, VaultError> {
    let key = make_key(key_bytes)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    fill_random(&mut nonce_bytes)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let aad = chunk_aad(file_nonce, index, last);

    let mut output = Vec::with_capacity(NONCE_LEN + plaintext.len() + TAG_LEN);
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(plaintext);

    // Encrypts `output[NONCE_LEN..]` in place; the GCM tag is appended
    // separately so the nonce prefix can stay in the same buffer.
    let tag = key
        .seal_in_place_separate_tag(nonce, Aad::from(&aad), &mut output[NONCE_LEN..])
        .map_err(|_| VaultError::CipherFailure)?;
    output.extend_from_slice(tag.as_ref());

    Ok(output)
}

/// Decrypt one chunk produced by [`seal_chunk`].
///
/// The caller supplies the same file nonce, index, and last-chunk flag the
/// chunk was sealed with; any mismatch, as well as tampering with the chunk
/// bytes themselves, fails the authentication check. The caller receives no
/// partial plaintext.
pub(crate) fn open_chunk(
    key_bytes: &[u8; KEY_LEN],
    file_nonce: &[u8; NONCE_LEN],
    index: u64,
    last: bool,
    chunk: &[u8],
) -> Result<Vec<u8>, VaultError> {
    if chunk.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::CipherFailure);
    }

    let nonce_bytes: [u8; NONCE_LEN] = chunk[..NONCE_LEN]
        .try_into()
        .map_err(|_| VaultError::CipherFailure)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let key = make_key(key_bytes)?;
    let aad = chunk_aad(file_nonce, index, last);

    let mut payload = chunk[NONCE_LEN..].to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::from(&aad), &mut payload)
        .map_err(|_| VaultError::CipherFailure)?;

    Ok(plaintext.to_vec())
}

//! Streaming cipher codec.
//!
//! Turns a plaintext byte stream into a ciphertext container on disk and
//! back, processing input in bounded chunks so large media files never sit
//! in memory whole. Both directions fail as a unit:
//!
//! - Encryption writes to a temporary file in the destination directory and
//!   atomically persists it only on full success. No half-written container
//!   ever appears at the destination path.
//! - Decryption writes to a uniquely named scratch file whose [`TempPath`]
//!   deletes it on drop. A failure mid-stream drops the scratch file with
//!   it; the caller never sees partial plaintext.

use std::io;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::crypto::{self, CHUNK_ENCRYPTED_SIZE, CHUNK_PLAINTEXT_SIZE, NONCE_LEN};
use crate::error::VaultError;
use crate::keys::KeyCustodian;

/// Encrypts and decrypts ciphertext containers using the custodian's key.
#[derive(Clone)]
pub struct CipherCodec {
    custodian: Arc<KeyCustodian>,
}

impl CipherCodec {
    pub fn new(custodian: Arc<KeyCustodian>) -> Self {
        Self { custodian }
    }

    /// Encrypt `reader` into a ciphertext container at `dest`.
    ///
    /// The container appears at `dest` atomically after the whole stream
    /// has been sealed and flushed; on any failure nothing is left there.
    pub async fn encrypt_stream<R>(&self, reader: &mut R, dest: &Path) -> Result<(), VaultError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let master = self.custodian.master().await?;
        let key = master.as_bytes();

        let dir = dest.parent().ok_or_else(|| {
            VaultError::SourceWrite(io::Error::new(
                io::ErrorKind::InvalidInput,
                "destination has no parent directory",
            ))
        })?;
        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(VaultError::SourceWrite)?;
        let (file, tmp_path) = tmp.into_parts();
        let mut out = tokio::fs::File::from_std(file);

        let file_nonce = crypto::generate_file_nonce()?;
        out.write_all(&file_nonce)
            .await
            .map_err(VaultError::SourceWrite)?;

        // One chunk of lookahead decides the last-chunk flag. A short read
        // marks the final chunk directly; a full chunk is final only when
        // the stream yields nothing more. Empty input still produces one
        // empty final chunk, so truncation to zero chunks is detectable.
        let mut index = 0u64;
        let mut current = read_plain_chunk(reader).await?;
        loop {
            let (last, next) = if current.len() == CHUNK_PLAINTEXT_SIZE {
                let next = read_plain_chunk(reader).await?;
                (next.is_empty(), next)
            } else {
                (true, Vec::new())
            };

            let sealed = crypto::seal_chunk(key, &file_nonce, index, last, &current)?;
            out.write_all(&sealed)
                .await
                .map_err(VaultError::SourceWrite)?;

            if last {
                break;
            }
            index += 1;
            current = next;
        }

        out.flush().await.map_err(VaultError::SourceWrite)?;
        out.sync_all().await.map_err(VaultError::SourceWrite)?;
        drop(out);

        tmp_path
            .persist(dest)
            .map_err(|e| VaultError::SourceWrite(e.error))?;
        Ok(())
    }

    /// Encrypt an in-memory buffer into a container at `dest`.
    pub async fn encrypt_bytes(&self, bytes: &[u8], dest: &Path) -> Result<(), VaultError> {
        let mut reader = bytes;
        self.encrypt_stream(&mut reader, dest).await
    }

    /// Decrypt the container at `src` into a fresh scratch file.
    ///
    /// The scratch file gets a unique name per call (`name_hint` plus a
    /// random suffix), so concurrent decryptions of the same container
    /// never collide. The returned [`TempPath`] deletes the file on drop.
    pub async fn decrypt_to_scratch(
        &self,
        src: &Path,
        scratch_dir: &Path,
        name_hint: &str,
    ) -> Result<TempPath, VaultError> {
        let master = self.custodian.master().await?;
        let key = master.as_bytes();

        let mut input = tokio::fs::File::open(src)
            .await
            .map_err(VaultError::SourceRead)?;

        let tmp = tempfile::Builder::new()
            .prefix(&format!("{}-", name_hint))
            .tempfile_in(scratch_dir)
            .map_err(VaultError::SourceWrite)?;
        let (file, tmp_path) = tmp.into_parts();
        let mut out = tokio::fs::File::from_std(file);

        let mut file_nonce = [0u8; NONCE_LEN];
        input
            .read_exact(&mut file_nonce)
            .await
            .map_err(|_| VaultError::CipherFailure)?;

        let mut index = 0u64;
        let mut current = read_cipher_chunk(&mut input).await?;
        if current.is_empty() {
            // A container with a nonce but no chunks was never produced by
            // the codec; treat it as truncated.
            return Err(VaultError::CipherFailure);
        }
        loop {
            let (last, next) = if current.len() == CHUNK_ENCRYPTED_SIZE {
                let next = read_cipher_chunk(&mut input).await?;
                (next.is_empty(), next)
            } else {
                (true, Vec::new())
            };

            let plain = crypto::open_chunk(key, &file_nonce, index, last, &current)?;
            out.write_all(&plain)
                .await
                .map_err(VaultError::SourceWrite)?;

            if last {
                break;
            }
            index += 1;
            current = next;
        }

        out.flush().await.map_err(VaultError::SourceWrite)?;
        Ok(tmp_path)
    }
}

/// Read up to one plaintext chunk, retrying short reads until the chunk is
/// full or the stream ends.
async fn read_plain_chunk<R>(reader: &mut R) -> Result<Vec<u8>, VaultError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_up_to(reader, CHUNK_PLAINTEXT_SIZE)
        .await
        .map_err(VaultError::SourceRead)
}

/// Read up to one encrypted chunk from the container body.
async fn read_cipher_chunk<R>(reader: &mut R) -> Result<Vec<u8>, VaultError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_up_to(reader, CHUNK_ENCRYPTED_SIZE)
        .await
        .map_err(VaultError::SourceRead)
}

async fn read_up_to<R>(reader: &mut R, limit: usize) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = vec![0u8; limit];
    let mut filled = 0;
    while filled < limit {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

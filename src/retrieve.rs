//! Retrieval pipeline.
//!
//! Scoped acquisition of plaintext: a record's ciphertext is decrypted
//! into a freshly named scratch file, handed to the caller, and deleted
//! when the guard drops — on normal return, panic, or task cancellation
//! alike. Every call gets its own scratch file, so concurrent retrievals
//! of the same record never share or overwrite each other's copy.

use std::path::Path;

use tempfile::TempPath;

use crate::catalog::VaultFileRecord;
use crate::codec::CipherCodec;
use crate::error::VaultError;

/// An ephemeral decrypted copy of a stored file.
///
/// The file exists for exactly as long as the guard: dropping it removes
/// the plaintext from disk. Not `Clone` — one guard, one file.
pub struct PlaintextGuard {
    path: TempPath,
}

impl PlaintextGuard {
    /// Location of the decrypted file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for PlaintextGuard {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

/// Decrypt `record`'s ciphertext into the scratch area.
///
/// The scratch name combines the record id with a random suffix — the id
/// alone is not unique across concurrent calls.
pub(crate) async fn open_scoped(
    codec: &CipherCodec,
    record: &VaultFileRecord,
    scratch_dir: &Path,
) -> Result<PlaintextGuard, VaultError> {
    let hint = format!("dec-{}", record.id);
    let path = codec
        .decrypt_to_scratch(&record.encrypted_path, scratch_dir, &hint)
        .await?;
    Ok(PlaintextGuard { path })
}

//! Error types for calcvault.
//!
//! Every variant is a distinct failure mode of the vault subsystem. Messages
//! are intentionally minimal — they signal *what* failed without revealing
//! *why* in ways that could leak cryptographic state.

use std::fmt;
use std::io;

/// The single error type for all vault operations.
#[derive(Debug)]
pub enum VaultError {
    /// The secure key store is inaccessible. Fatal for the whole vault
    /// session: the caller should treat the vault as temporarily
    /// unavailable, not as data loss. Never retried automatically.
    KeyUnavailable(String),

    /// Encryption or decryption failed. This includes: wrong key state,
    /// tampered or truncated ciphertext, or a corrupted authentication tag.
    /// Scoped to one file; other files are unaffected.
    CipherFailure,

    /// The system's random number generator failed to produce bytes.
    RandomnessFailure,

    /// Reading the source resource failed during ingestion or retrieval.
    SourceRead(io::Error),

    /// Writing to durable or scratch storage failed.
    SourceWrite(io::Error),

    /// The catalog store is unavailable or corrupt. The operation aborts.
    Catalog(String),

    /// The authentication gate reported a simple mismatch.
    AuthFailed,

    /// The authentication gate reported a hard error (distinct from a
    /// mismatch: the caller may want to cancel rather than retry).
    AuthError(String),

    /// No record with the given id exists in the catalog.
    RecordNotFound(u64),

    /// The record belongs to a different partition than the session.
    WrongPartition,
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyUnavailable(reason) => write!(f, "key store unavailable: {}", reason),
            Self::CipherFailure => write!(f, "cipher operation failed"),
            Self::RandomnessFailure => write!(f, "randomness source failed"),
            Self::SourceRead(e) => write!(f, "source read failed: {}", e),
            Self::SourceWrite(e) => write!(f, "storage write failed: {}", e),
            Self::Catalog(reason) => write!(f, "catalog failure: {}", reason),
            Self::AuthFailed => write!(f, "authentication failed"),
            Self::AuthError(reason) => write!(f, "authentication error: {}", reason),
            Self::RecordNotFound(id) => write!(f, "record not found: {}", id),
            Self::WrongPartition => write!(f, "record belongs to another partition"),
        }
    }
}

impl std::error::Error for VaultError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SourceRead(e) | Self::SourceWrite(e) => Some(e),
            _ => None,
        }
    }
}

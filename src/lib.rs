//! # calcvault
//!
//! The encrypted vault core of a disguised personal data vault: an
//! application that looks like an ordinary calculator but, on recognising
//! a secret input pattern, unlocks one of two isolated encrypted file
//! partitions — `real` and `decoy`.
//!
//! Three things live here:
//!
//! - the **secret-pattern detector** (and the calculator engine it hides
//!   inside), which turns ordinary keystrokes into a vault selection
//!   without any observable change to calculator behavior;
//! - the **vault storage engine**: key custody, a streaming cipher codec,
//!   a partitioned catalog with live views, and the ingestion / retrieval
//!   pipelines around them;
//! - the **thumbnail derivation pipeline** producing encrypted preview
//!   artifacts for media items.
//!
//! Rendering, navigation, the verification prompt, and media decoding are
//! external collaborators consumed through the traits in [`auth`],
//! [`keys`], and [`thumbnail`]. File *contents* are encrypted; catalog
//! metadata is not — its existence reveals vault occupancy to anyone with
//! filesystem access, which is an accepted limitation.
//!
//! ## Public API
//!
//! The public surface of this crate is intentionally narrow. Construction
//! goes through [`Vault::open`] with explicitly passed collaborators;
//! everything else hangs off a [`VaultSession`] minted by
//! [`Vault::unlock`].

pub mod auth;
pub mod calculator;
pub mod catalog;
pub mod codec;
pub(crate) mod crypto;
pub mod detector;
pub mod error;
pub mod ingest;
pub mod keys;
pub mod retrieve;
pub mod thumbnail;
pub mod vault;

pub use error::VaultError;
pub use vault::{Vault, VaultSession};

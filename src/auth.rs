//! Authentication gate interface.
//!
//! The device's verification prompt (biometric, credential, ...) is an
//! external collaborator. The subsystem consumes it as a capability —
//! "request user verification, get an outcome" — and mints vault sessions
//! only on success. There is no other path to a session.

use std::future::Future;
use std::pin::Pin;

/// Result of one verification attempt.
///
/// The three variants are deliberately distinct: `Failed` is a simple
/// mismatch the user may retry, `Error` is a hard failure after which the
/// caller typically cancels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    Failed,
    Error(String),
}

/// Future returned by [`AuthGate::verify`].
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = AuthOutcome> + Send + 'a>>;

/// The external verification capability.
pub trait AuthGate: Send + Sync {
    /// Run one verification round against the user.
    fn verify(&self) -> AuthFuture<'_>;
}

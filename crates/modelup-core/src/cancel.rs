//! Cooperative cancellation for a whole update run.
//!
//! One `CancellationToken` is created per run and cloned into the resolver,
//! the fetcher and the hashing tasks. The Ctrl-C handler flips it; every
//! long-running loop polls it between units of work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cancellation token shared by everything participating in a run.
///
/// # Example
///
/// ```
/// use modelup_core::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handler_copy = token.clone();
///
/// handler_copy.cancel();
/// assert!(token.is_cancelled());
/// assert!(token.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(CancelledError)` once cancellation has been requested.
    ///
    /// Meant for `?` at the top of each walk step, network round trip and
    /// stream chunk.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError)
        } else {
            Ok(())
        }
    }
}

/// Error returned when an operation is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelledError;

impl std::fmt::Display for CancelledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operation was cancelled")
    }
}

impl std::error::Error for CancelledError {}

impl From<CancelledError> for crate::error::UpdaterError {
    fn from(_: CancelledError) -> Self {
        crate::error::UpdaterError::Cancelled
    }
}

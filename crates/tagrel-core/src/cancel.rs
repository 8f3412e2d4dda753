//! Cooperative cancellation for store reads and autocomplete fetches.
//!
//! Nothing here interrupts a running task. Work that can be cancelled checks
//! its token between discrete units (after each store call, after each
//! resolution pass) and bails out with [`CancelledError`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A cancellation flag shared between the task doing the work and whoever may
/// want it to stop.
///
/// # Example
///
/// ```
/// use tagrel_core::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
///
/// token.cancel();
/// assert!(observer.is_cancelled());
/// assert!(observer.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, uncancelled token.
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

    /// Check cancellation and return an error if cancelled.
    ///
    /// Meant to be used with `?` between units of work.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError)
        } else {
            Ok(())
        }
    }
}

/// Holds the token of the single piece of work currently allowed to run.
///
/// Starting new work through [`CancellationSlot::replace`] cancels whatever
/// was in flight before, so at most one holder ever sees an uncancelled token.
#[derive(Debug, Default)]
pub struct CancellationSlot {
    current: Mutex<Option<CancellationToken>>,
}

impl CancellationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the in-flight token (if any) and install a fresh one.
    pub fn replace(&self) -> CancellationToken {
        let fresh = CancellationToken::new();
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = current.replace(fresh.clone()) {
            previous.cancel();
        }
        fresh
    }

    /// Cancel the in-flight token without starting new work.
    pub fn cancel(&self) {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = current.take() {
            previous.cancel();
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

impl From<CancelledError> for crate::error::TagRelError {
    fn from(_: CancelledError) -> Self {
        crate::error::TagRelError::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TagRelError;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
        assert_eq!(token2.check(), Err(CancelledError));
    }

    #[test]
    fn test_slot_replace_cancels_previous() {
        let slot = CancellationSlot::new();
        let first = slot.replace();
        assert!(!first.is_cancelled());

        let second = slot.replace();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_slot_cancel() {
        let slot = CancellationSlot::new();
        let token = slot.replace();
        slot.cancel();
        assert!(token.is_cancelled());

        // Nothing in flight: cancel is a no-op.
        slot.cancel();
    }

    #[test]
    fn test_cancelled_error_converts() {
        let err: TagRelError = CancelledError.into();
        assert!(matches!(err, TagRelError::Cancelled));
    }
}

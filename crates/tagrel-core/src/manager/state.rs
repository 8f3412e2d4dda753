//! Refresh state of the relationship cache.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Where the cache is in its edit → rebuild cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    /// Graphs reflect the store as of the last rebuild.
    Clean = 0,
    /// An edit arrived; a rebuild is scheduled.
    Dirty = 1,
    /// A rebuild is reading the store.
    Rebuilding = 2,
}

impl std::fmt::Display for RefreshState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshState::Clean => write!(f, "clean"),
            RefreshState::Dirty => write!(f, "dirty"),
            RefreshState::Rebuilding => write!(f, "rebuilding"),
        }
    }
}

impl RefreshState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RefreshState::Dirty,
            2 => RefreshState::Rebuilding,
            _ => RefreshState::Clean,
        }
    }
}

/// Atomic wrapper for [`RefreshState`].
#[derive(Debug)]
pub(crate) struct AtomicRefreshState(AtomicU8);

impl AtomicRefreshState {
    pub(crate) fn new(state: RefreshState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> RefreshState {
        RefreshState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn store(&self, state: RefreshState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Move from `current` to `new`. Returns false if another transition got
    /// there first.
    pub(crate) fn transition(&self, current: RefreshState, new: RefreshState) -> bool {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

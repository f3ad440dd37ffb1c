//! In-process [`StateBackend`] that keeps the last snapshot in memory.
//!
//! Used when state only travels downstream through the emitter, and in tests
//! to observe every persisted snapshot.

use std::sync::Mutex;

use ilevel_types::state::SyncState;

use crate::backend::StateBackend;
use crate::error::{self, StateError};

/// Memory-only state storage.
#[derive(Default)]
pub struct MemoryStateBackend {
    history: Mutex<Vec<SyncState>>,
    initial: SyncState,
}

impl MemoryStateBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a pre-existing snapshot, as if a previous run had persisted it.
    #[must_use]
    pub fn with_state(initial: SyncState) -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            initial,
        }
    }

    /// Every snapshot persisted so far, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::LockPoisoned`] if a writer panicked.
    pub fn history(&self) -> error::Result<Vec<SyncState>> {
        self.history
            .lock()
            .map(|h| h.clone())
            .map_err(|_| StateError::LockPoisoned)
    }
}

impl StateBackend for MemoryStateBackend {
    fn load(&self) -> error::Result<SyncState> {
        let history = self.history.lock().map_err(|_| StateError::LockPoisoned)?;
        Ok(history.last().cloned().unwrap_or_else(|| self.initial.clone()))
    }

    fn persist(&self, state: &SyncState) -> error::Result<()> {
        self.history
            .lock()
            .map_err(|_| StateError::LockPoisoned)?
            .push(state.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

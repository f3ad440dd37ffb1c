//! Per-stream watermark bookkeeping with write-through persistence.
//!
//! [`BookmarkStore`] owns the run's [`SyncState`]. Every mutation is
//! followed by a blocking [`StateBackend::persist`] before control
//! returns, so an interrupted run loses at most the unit in flight.

use std::sync::Arc;

use ilevel_state::{StateBackend, StateError};
use ilevel_types::state::{SyncState, Watermark};
use ilevel_types::stream::StreamName;

/// Watermark map plus currently-syncing marker, persisted on every change.
pub struct BookmarkStore {
    state: SyncState,
    backend: Arc<dyn StateBackend>,
}

impl BookmarkStore {
    /// Load the last persisted snapshot from `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the backend cannot be read.
    pub fn load(backend: Arc<dyn StateBackend>) -> Result<Self, StateError> {
        let state = backend.load()?;
        tracing::debug!(
            backend = %backend.describe(),
            bookmarks = state.bookmarks.len(),
            "Loaded sync state"
        );
        Ok(Self { state, backend })
    }

    /// Persisted watermark for `stream`, or `default` when none exists.
    #[must_use]
    pub fn get(&self, stream: &StreamName, default: Watermark) -> Watermark {
        self.state.watermark(stream).unwrap_or(default)
    }

    /// Persisted watermark for `stream`, if any.
    #[must_use]
    pub fn watermark(&self, stream: &StreamName) -> Option<Watermark> {
        self.state.watermark(stream)
    }

    /// Overwrite the watermark for `stream` and persist the full snapshot.
    ///
    /// Callers are responsible for only moving a watermark forward; use
    /// [`advance`](Self::advance) to have that checked.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if persistence fails. The in-memory value is
    /// already updated at that point.
    pub fn set(&mut self, stream: &StreamName, value: Watermark) -> Result<(), StateError> {
        self.state.bookmarks.insert(stream.clone(), value);
        self.backend.persist(&self.state)
    }

    /// Set the watermark only if `value` is later than the stored one.
    ///
    /// Returns whether the watermark moved.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if persistence fails.
    pub fn advance(&mut self, stream: &StreamName, value: Watermark) -> Result<bool, StateError> {
        match self.state.watermark(stream) {
            Some(current) if value <= current => {
                tracing::debug!(
                    stream = stream.as_str(),
                    current = %current,
                    proposed = %value,
                    "Watermark not advanced: proposed value is not newer"
                );
                Ok(false)
            }
            _ => {
                self.set(stream, value)?;
                Ok(true)
            }
        }
    }

    /// Record which stream is in flight (`None` clears the marker) and persist.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if persistence fails.
    pub fn mark_syncing(&mut self, stream: Option<&StreamName>) -> Result<(), StateError> {
        self.state.currently_syncing = stream.cloned();
        self.backend.persist(&self.state)
    }

    /// Marker left by the last persisted snapshot.
    #[must_use]
    pub fn currently_syncing(&self) -> Option<&StreamName> {
        self.state.currently_syncing.as_ref()
    }

    /// Persist the current snapshot without changing it.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if persistence fails.
    pub fn flush(&self) -> Result<(), StateError> {
        self.backend.persist(&self.state)
    }

    #[must_use]
    pub fn snapshot(&self) -> &SyncState {
        &self.state
    }
}

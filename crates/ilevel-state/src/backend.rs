//! State backend trait definition.
//!
//! [`StateBackend`] defines the storage contract for the run's
//! [`SyncState`] snapshot. Model types live in [`ilevel_types::state`].

use ilevel_types::state::SyncState;

use crate::error;

/// Storage contract for sync state.
///
/// Every `persist` replaces the whole snapshot; there are no partial
/// updates. Implementations must be `Send + Sync` for use behind
/// `Arc<dyn StateBackend>`.
pub trait StateBackend: Send + Sync {
    /// Read the last persisted snapshot.
    ///
    /// Returns an empty [`SyncState`] when nothing has been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure
    /// or when stored data cannot be decoded.
    fn load(&self) -> error::Result<SyncState>;

    /// Replace the persisted snapshot with `state`. Blocks until durable.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn persist(&self, state: &SyncState) -> error::Result<()>;

    /// Short label for log lines.
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (can be used as `dyn StateBackend`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn StateBackend) {}
    }
}

//! Fatal run errors.
//!
//! Everything below [`SyncError`] is absorbed where it happens: transport
//! failures zero one unit, transform failures skip one record. Only the
//! variants here stop a run.

use ilevel_state::StateError;
use ilevel_types::error::ExtractError;

use crate::emitter::EmitError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Configuration could not be turned into a runnable plan.
    #[error(transparent)]
    Config(ExtractError),

    /// Checkpoint store could not be read or written.
    #[error("state backend failure: {0}")]
    State(#[from] StateError),

    /// Downstream sink rejected a message.
    #[error("emitter failure: {0}")]
    Sink(#[from] EmitError),
}

impl SyncError {
    /// Short label for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::State(_) => "state",
            Self::Sink(_) => "sink",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_is_transparent() {
        let err = SyncError::Config(ExtractError::config("start_date is required"));
        assert_eq!(err.to_string(), "invalid configuration: start_date is required");
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn state_error_converts() {
        let err: SyncError = StateError::LockPoisoned.into();
        assert_eq!(err.kind(), "state");
        assert!(err.to_string().starts_with("state backend failure"));
    }
}

//! State backend creation from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use ilevel_state::{JsonFileStateBackend, MemoryStateBackend, SqliteStateBackend, StateBackend};

use crate::config::types::{StateBackendKind, StateConfig};

/// Open the configured state backend.
///
/// # Errors
///
/// Returns an error if a durable backend has no path or cannot be opened.
pub fn create_state_backend(config: &StateConfig) -> Result<Arc<dyn StateBackend>> {
    match config.backend {
        StateBackendKind::Sqlite => {
            let path = config
                .path
                .as_deref()
                .context("state.path is required for the sqlite backend")?;
            let backend = SqliteStateBackend::open(path)
                .with_context(|| format!("Failed to open state DB: {}", path.display()))?;
            Ok(Arc::new(backend) as Arc<dyn StateBackend>)
        }
        StateBackendKind::JsonFile => {
            let path = config
                .path
                .as_deref()
                .context("state.path is required for the json_file backend")?;
            Ok(Arc::new(JsonFileStateBackend::new(path)) as Arc<dyn StateBackend>)
        }
        StateBackendKind::None => Ok(Arc::new(MemoryStateBackend::new()) as Arc<dyn StateBackend>),
    }
}

/// Open the backend and read it once, logging the outcome.
pub fn check_state_backend(config: &StateConfig) -> bool {
    let result = create_state_backend(config).and_then(|backend| {
        let state = backend.load().context("Failed to load state")?;
        Ok((backend.describe(), state.bookmarks.len()))
    });
    match result {
        Ok((label, bookmarks)) => {
            tracing::info!(backend = %label, bookmarks, "State backend: OK");
            true
        }
        Err(e) => {
            tracing::error!("State backend: FAILED ({e:#})");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_backend_is_in_memory() {
        let backend = create_state_backend(&StateConfig::default()).unwrap();
        assert_eq!(backend.describe(), "memory");
    }

    #[test]
    fn durable_backends_need_a_path() {
        let config = StateConfig {
            backend: StateBackendKind::Sqlite,
            path: None,
        };
        assert!(create_state_backend(&config).is_err());
        assert!(!check_state_backend(&config));
    }

    #[test]
    fn opens_file_backends() {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = StateConfig {
            backend: StateBackendKind::Sqlite,
            path: Some(dir.path().join("state.db")),
        };
        assert!(create_state_backend(&sqlite)
            .unwrap()
            .describe()
            .starts_with("sqlite:"));
        assert!(check_state_backend(&sqlite));

        let json = StateConfig {
            backend: StateBackendKind::JsonFile,
            path: Some(dir.path().join("state.json")),
        };
        assert!(check_state_backend(&json));
    }
}

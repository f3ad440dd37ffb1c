//! JSON state-file implementation of [`StateBackend`].
//!
//! Writes the Singer-style state document (`{"bookmarks": {...}}`) to a
//! sibling temp file and renames it over the target, so a crash mid-write
//! leaves the previous snapshot intact.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ilevel_types::state::SyncState;

use crate::backend::StateBackend;
use crate::error;

/// State stored as a single JSON document on disk.
pub struct JsonFileStateBackend {
    path: PathBuf,
}

impl JsonFileStateBackend {
    /// Use `path` as the state document. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateBackend for JsonFileStateBackend {
    fn load(&self) -> error::Result<SyncState> {
        if !self.path.exists() {
            return Ok(SyncState::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(SyncState::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn persist(&self, state: &SyncState) -> error::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, state)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&temp_path, &self.path)?;
        tracing::trace!(path = %self.path.display(), "state file written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use ilevel_types::state::Watermark;
    use ilevel_types::stream::StreamName;

    use super::*;

    #[test]
    fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileStateBackend::new(dir.path().join("state.json"));
        assert_eq!(backend.load().unwrap(), SyncState::default());
    }

    #[test]
    fn persist_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileStateBackend::new(dir.path().join("out").join("state.json"));

        let mut state = SyncState::default();
        state.bookmarks.insert(
            StreamName::new("assets"),
            Watermark::parse("2023-02-01T00:00:00Z").unwrap(),
        );
        state.currently_syncing = Some(StreamName::new("assets"));
        backend.persist(&state).unwrap();

        assert_eq!(backend.load().unwrap(), state);
        assert!(!backend.path().with_extension("tmp").exists());
    }

    #[test]
    fn reads_hand_written_singer_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"bookmarks": {"funds": "2023-01-10"}, "currently_syncing": "funds"}"#,
        )
        .unwrap();

        let state = JsonFileStateBackend::new(&path).load().unwrap();
        assert_eq!(
            state.watermark(&StreamName::new("funds")).unwrap().to_string(),
            "2023-01-10T00:00:00Z"
        );
        assert_eq!(state.currently_syncing, Some(StreamName::new("funds")));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert!(JsonFileStateBackend::new(&path).load().is_err());
    }
}

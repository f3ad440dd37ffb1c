//! Extraction configuration types, deserialized from YAML.

use std::path::PathBuf;

use serde::Deserialize;

use crate::batcher::DEFAULT_MAX_ID_BATCH_SIZE;
use crate::planner::DEFAULT_MAX_SPAN_DAYS;

fn default_max_span_days() -> u32 {
    DEFAULT_MAX_SPAN_DAYS
}

fn default_max_id_batch_size() -> usize {
    DEFAULT_MAX_ID_BATCH_SIZE
}

/// Top-level extraction configuration.
///
/// Dates are kept as text here; [`validate_config`](super::validate_config)
/// parses them so every problem can be reported at once.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractConfig {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_max_span_days")]
    pub max_span_days: u32,
    #[serde(default = "default_max_id_batch_size")]
    pub max_id_batch_size: usize,
    /// Selected stream names. `None` selects every built-in stream.
    #[serde(default)]
    pub streams: Option<Vec<String>>,
    #[serde(default)]
    pub state: StateConfig,
}

/// Where watermarks are kept between runs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackendKind,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StateConfig {
    /// Point state at `path`, keeping a configured durable backend.
    ///
    /// With no durable backend configured, a `.json` path selects the JSON
    /// file backend and anything else selects SQLite.
    pub fn override_path(&mut self, path: PathBuf) {
        if !self.backend.is_durable() {
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            self.backend = if is_json {
                StateBackendKind::JsonFile
            } else {
                StateBackendKind::Sqlite
            };
        }
        self.path = Some(path);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBackendKind {
    Sqlite,
    JsonFile,
    /// State only travels downstream through `STATE` messages.
    #[default]
    None,
}

impl StateBackendKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::JsonFile => "json_file",
            Self::None => "none",
        }
    }

    /// Whether this backend needs a `path`.
    #[must_use]
    pub fn is_durable(self) -> bool {
        !matches!(self, Self::None)
    }
}

pub mod check;
pub mod streams;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ilevel_engine::config::{parser, ExtractConfig};

/// Parse the config file and apply a `--state` override.
pub(crate) fn load_config(path: &Path, state: Option<PathBuf>) -> Result<ExtractConfig> {
    let mut config = parser::parse_config(path)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    if let Some(state) = state {
        config.state.override_path(state);
    }
    Ok(config)
}

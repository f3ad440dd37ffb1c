//! Extraction config loading.
//!
//! Values may reference the environment as `${NAME}` or `${NAME:-fallback}`.
//! Substitution runs once over the raw text before YAML parsing, so a
//! substituted value is never expanded again.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};

use crate::config::types::ExtractConfig;

static ENV_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid env reference regex")
});

/// Expand environment references in `input`.
///
/// An unset variable falls back to its `:-` default when one is given.
///
/// # Errors
///
/// Fails naming every unset variable that has no default, each once.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut unset: Vec<String> = Vec::new();
    let expanded = ENV_REF_RE.replace_all(input, |caps: &Captures<'_>| {
        let name = &caps[1];
        match (std::env::var(name), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(fallback)) => fallback.as_str().to_owned(),
            (Err(_), None) => {
                if !unset.iter().any(|seen| seen == name) {
                    unset.push(name.to_owned());
                }
                String::new()
            }
        }
    });

    if !unset.is_empty() {
        anyhow::bail!(
            "config references unset environment variable(s): {}",
            unset.join(", ")
        );
    }
    Ok(expanded.into_owned())
}

/// # Errors
///
/// Returns an error if substitution fails or the YAML does not match
/// [`ExtractConfig`].
pub fn parse_config_str(yaml: &str) -> Result<ExtractConfig> {
    let expanded = substitute_env_vars(yaml)?;
    serde_yaml::from_str(&expanded).context("Invalid extraction config YAML")
}

/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn parse_config(path: &Path) -> Result<ExtractConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read extraction config: {}", path.display()))?;
    parse_config_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::StateBackendKind;

    #[test]
    fn start_date_from_environment() {
        std::env::set_var("ILEVEL_PARSER_START", "2023-01-01");
        let config = parse_config_str("start_date: \"${ILEVEL_PARSER_START}\"").unwrap();
        std::env::remove_var("ILEVEL_PARSER_START");
        assert_eq!(config.start_date.as_deref(), Some("2023-01-01"));
    }

    #[test]
    fn unset_variable_uses_fallback() {
        let yaml = "start_date: \"${ILEVEL_PARSER_UNSET_START:-2022-07-01}\"\n\
                    max_span_days: ${ILEVEL_PARSER_UNSET_SPAN:-7}\n";
        let config = parse_config_str(yaml).unwrap();
        assert_eq!(config.start_date.as_deref(), Some("2022-07-01"));
        assert_eq!(config.max_span_days, 7);
    }

    #[test]
    fn set_variable_wins_over_fallback() {
        std::env::set_var("ILEVEL_PARSER_BATCH", "250");
        let out = substitute_env_vars("max_id_batch_size: ${ILEVEL_PARSER_BATCH:-20000}").unwrap();
        std::env::remove_var("ILEVEL_PARSER_BATCH");
        assert_eq!(out, "max_id_batch_size: 250");
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        std::env::set_var("ILEVEL_PARSER_NESTED", "${ILEVEL_PARSER_NEVER_SET}");
        let out = substitute_env_vars("path: ${ILEVEL_PARSER_NESTED}").unwrap();
        std::env::remove_var("ILEVEL_PARSER_NESTED");
        assert_eq!(out, "path: ${ILEVEL_PARSER_NEVER_SET}");
    }

    #[test]
    fn names_each_unset_variable_once() {
        let err = substitute_env_vars(
            "start_date: ${ILEVEL_PARSER_NO_START}\nend_date: ${ILEVEL_PARSER_NO_END}\n\
             path: ${ILEVEL_PARSER_NO_START}",
        )
        .unwrap_err()
        .to_string();
        assert_eq!(
            err,
            "config references unset environment variable(s): \
             ILEVEL_PARSER_NO_START, ILEVEL_PARSER_NO_END"
        );
    }

    #[test]
    fn parses_full_config() {
        let yaml = r#"
start_date: "2023-01-01"
end_date: "2023-03-15T00:00:00Z"
max_span_days: 15
max_id_batch_size: 500
streams: [assets, investment_transactions]
state:
  backend: sqlite
  path: /tmp/ilevel/state.db
"#;
        let config = parse_config_str(yaml).unwrap();
        assert_eq!(config.start_date.as_deref(), Some("2023-01-01"));
        assert_eq!(config.end_date.as_deref(), Some("2023-03-15T00:00:00Z"));
        assert_eq!(config.max_span_days, 15);
        assert_eq!(config.max_id_batch_size, 500);
        assert_eq!(config.streams.unwrap().len(), 2);
        assert_eq!(config.state.backend, StateBackendKind::Sqlite);
    }

    #[test]
    fn omitted_limits_take_service_defaults() {
        let config = parse_config_str("start_date: \"2023-01-01\"").unwrap();
        assert_eq!(config.max_span_days, 30);
        assert_eq!(config.max_id_batch_size, 20_000);
        assert!(config.streams.is_none());
        assert!(config.end_date.is_none());
        assert_eq!(config.state.backend, StateBackendKind::None);
    }

    #[test]
    fn misspelled_key_is_rejected() {
        let err = parse_config_str("start_date: \"2023-01-01\"\nmax_days: 3").unwrap_err();
        assert!(err.to_string().contains("Invalid extraction config YAML"));
        assert!(format!("{err:#}").contains("max_days"));
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extract.yaml");
        std::fs::write(&path, "start_date: \"2023-06-01\"\nmax_span_days: 10\n").unwrap();
        let config = parse_config(&path).unwrap();
        assert_eq!(config.start_date.as_deref(), Some("2023-06-01"));
        assert_eq!(config.max_span_days, 10);

        let err = parse_config(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read extraction config"));
    }
}

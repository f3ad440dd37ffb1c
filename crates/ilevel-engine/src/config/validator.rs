//! Semantic validation: turns a parsed [`ExtractConfig`] into runnable settings.

use std::num::{NonZeroU32, NonZeroUsize};

use chrono::NaiveDateTime;
use ilevel_types::catalog::{builtin_streams, find_stream};
use ilevel_types::error::ExtractError;
use ilevel_types::state::Watermark;
use ilevel_types::stream::StreamDescriptor;

use crate::batcher::IdBatcher;
use crate::config::types::ExtractConfig;
use crate::dispatcher::RunBounds;
use crate::planner::WindowPlanner;

/// Validated, typed run settings.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub start_date: Watermark,
    /// `None` means "now", resolved when the run starts.
    pub end: Option<NaiveDateTime>,
    pub max_span_days: NonZeroU32,
    pub max_id_batch_size: NonZeroUsize,
    /// Selected streams in processing order.
    pub streams: Vec<StreamDescriptor>,
}

impl SyncSettings {
    #[must_use]
    pub fn planner(&self) -> WindowPlanner {
        WindowPlanner::new(self.max_span_days)
    }

    #[must_use]
    pub fn batcher(&self) -> IdBatcher {
        IdBatcher::new(self.max_id_batch_size)
    }

    /// Fix the run bounds, using `now` when no end date is configured.
    #[must_use]
    pub fn bounds(&self, now: NaiveDateTime) -> RunBounds {
        RunBounds {
            start_date: self.start_date,
            end: self.end.unwrap_or(now),
        }
    }
}

fn parse_date_field(field: &str, value: &str, errors: &mut Vec<String>) -> Option<Watermark> {
    let parsed = Watermark::parse(value);
    if parsed.is_none() {
        errors.push(format!("{field} '{value}' is not a recognised date"));
    }
    parsed
}

/// Validate a parsed configuration, reporting every problem at once.
///
/// Selected streams keep the built-in processing order regardless of the
/// order they are listed in.
///
/// # Errors
///
/// Returns [`ExtractError::Config`] listing all validation failures.
pub fn validate_config(config: &ExtractConfig) -> Result<SyncSettings, ExtractError> {
    let mut errors = Vec::new();

    let start_date = match config.start_date.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => parse_date_field("start_date", value, &mut errors),
        _ => {
            errors.push("start_date is required".to_string());
            None
        }
    };
    let end = config
        .end_date
        .as_deref()
        .and_then(|value| parse_date_field("end_date", value.trim(), &mut errors));
    if let (Some(start), Some(end)) = (start_date, end) {
        if end < start {
            errors.push(format!("end_date {end} is before start_date {start}"));
        }
    }

    let max_span_days = NonZeroU32::new(config.max_span_days);
    if max_span_days.is_none() {
        errors.push("max_span_days must be > 0".to_string());
    }
    let max_id_batch_size = NonZeroUsize::new(config.max_id_batch_size);
    if max_id_batch_size.is_none() {
        errors.push("max_id_batch_size must be > 0".to_string());
    }

    let streams = match &config.streams {
        None => builtin_streams(),
        Some(names) => {
            if names.is_empty() {
                errors.push("streams must not be empty when given".to_string());
            }
            for name in names {
                if find_stream(name).is_none() {
                    errors.push(format!("unknown stream '{name}'"));
                }
            }
            builtin_streams()
                .into_iter()
                .filter(|s| names.iter().any(|n| n == s.name.as_str()))
                .collect()
        }
    };

    if config.state.backend.is_durable() && config.state.path.is_none() {
        errors.push(format!(
            "state.path is required for the '{}' state backend",
            config.state.backend.as_str()
        ));
    }

    match (start_date, max_span_days, max_id_batch_size) {
        (Some(start_date), Some(max_span_days), Some(max_id_batch_size)) if errors.is_empty() => {
            Ok(SyncSettings {
                start_date,
                end: end.map(|wm| wm.value()),
                max_span_days,
                max_id_batch_size,
                streams,
            })
        }
        _ => Err(ExtractError::config(format!(
            "validation failed:\n  - {}",
            errors.join("\n  - ")
        ))),
    }
}

//! Run orchestrator: loads state, drives every selected stream in order,
//! and writes the final checkpoint.

use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDateTime, Utc};
use ilevel_state::StateBackend;
use ilevel_types::state::{SyncState, Watermark};
use ilevel_types::stream::{RetrievalStrategy, StreamName};

use crate::bookmark::BookmarkStore;
use crate::config::types::ExtractConfig;
use crate::config::validator::{validate_config, SyncSettings};
use crate::dispatcher::{pending_days, StreamDispatcher};
use crate::emitter::Emitter;
use crate::errors::SyncError;
use crate::result::SyncResult;
use crate::transport::Transport;

/// Validate a parsed config for a run.
///
/// # Errors
///
/// Returns [`SyncError::Config`] listing every configuration problem.
pub fn prepare(config: &ExtractConfig) -> Result<SyncSettings, SyncError> {
    validate_config(config).map_err(SyncError::Config)
}

/// Sync every selected stream, ending at the configured end date or now.
///
/// # Errors
///
/// Returns [`SyncError`] when the state backend or the emitter fails.
/// Progress checkpointed before the failure is kept.
pub fn run_sync(
    settings: &SyncSettings,
    transport: &dyn Transport,
    emitter: &mut dyn Emitter,
    backend: Arc<dyn StateBackend>,
) -> Result<SyncResult, SyncError> {
    run_sync_at(settings, Utc::now().naive_utc(), transport, emitter, backend)
}

/// [`run_sync`] with an explicit "now".
///
/// # Errors
///
/// Returns [`SyncError`] when the state backend or the emitter fails.
pub fn run_sync_at(
    settings: &SyncSettings,
    now: NaiveDateTime,
    transport: &dyn Transport,
    emitter: &mut dyn Emitter,
    backend: Arc<dyn StateBackend>,
) -> Result<SyncResult, SyncError> {
    let started = Instant::now();
    let bounds = settings.bounds(now);
    tracing::info!(
        streams = settings.streams.len(),
        start_date = %bounds.start_date,
        end = %Watermark::new(bounds.end),
        state = %backend.describe(),
        "Starting sync run"
    );

    let mut bookmarks = BookmarkStore::load(backend)?;
    if let Some(previous) = bookmarks.currently_syncing() {
        tracing::warn!(
            stream = previous.as_str(),
            "Previous run stopped while syncing this stream; resuming from its last checkpoint"
        );
    }

    let mut streams = Vec::with_capacity(settings.streams.len());
    {
        let mut dispatcher = StreamDispatcher::new(
            transport,
            &mut *emitter,
            &mut bookmarks,
            settings.planner(),
            settings.batcher(),
            bounds,
        );
        for stream in &settings.streams {
            streams.push(dispatcher.run_stream(stream)?);
        }
    }

    bookmarks.flush()?;
    emitter.persist_state(bookmarks.snapshot())?;

    let result = SyncResult {
        streams,
        duration_secs: started.elapsed().as_secs_f64(),
    };
    let totals = result.totals();
    tracing::info!(
        streams = result.streams.len(),
        emitted = totals.emitted,
        filtered = totals.filtered,
        failed_records = totals.failed_records,
        failed_units = totals.failed_units,
        duration_secs = result.duration_secs,
        "Sync run complete"
    );
    Ok(result)
}

/// What a run would do for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPlan {
    pub stream: StreamName,
    pub strategy: RetrievalStrategy,
    /// Watermark the stream resumes from; `None` for full-table streams.
    pub resume_from: Option<Watermark>,
    /// Windows, days, or snapshot calls still to issue.
    pub units: usize,
}

/// Describe the work each selected stream has left, without calling the service.
#[must_use]
pub fn plan_streams(
    settings: &SyncSettings,
    state: &SyncState,
    now: NaiveDateTime,
) -> Vec<StreamPlan> {
    let bounds = settings.bounds(now);
    let planner = settings.planner();
    settings
        .streams
        .iter()
        .map(|stream| {
            let watermark = state.watermark(&stream.name);
            let (resume_from, units) = match stream.strategy {
                RetrievalStrategy::FullSnapshot => (None, 1),
                RetrievalStrategy::ExactDateMatch => (
                    Some(watermark.unwrap_or(bounds.start_date)),
                    pending_days(watermark, &bounds).len(),
                ),
                RetrievalStrategy::IncrementalByChangedIds | RetrievalStrategy::TwoStagePeriodic => {
                    let start = watermark.unwrap_or(bounds.start_date);
                    let units = if start.date() >= bounds.end_date() {
                        0
                    } else {
                        planner.windows(start.date(), bounds.end_date()).len()
                    };
                    (Some(start), units)
                }
            };
            StreamPlan {
                stream: stream.name.clone(),
                strategy: stream.strategy,
                resume_from,
                units,
            }
        })
        .collect()
}

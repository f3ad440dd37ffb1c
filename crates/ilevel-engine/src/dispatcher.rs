//! Per-stream strategy driver.
//!
//! [`StreamDispatcher::run_stream`] selects the retrieval strategy from the
//! stream descriptor and drives it to completion. Each caught
//! [`ExtractError`] is handled by its
//! [`ErrorScope`](ilevel_types::error::ErrorScope). Unit-scoped failures zero
//! the unit that issued them and record-scoped failures skip one record.
//! Run-scoped failures abort. The watermark is checkpointed after every
//! completed window or day.
//!
//! Adjacent windows share their boundary day. An incremental window is
//! checkpointed at the later of its end-day midnight and the newest
//! replication-key value it emitted, and that checkpoint is the next
//! window's cutoff, so a record stamped during the shared day is emitted
//! once.

use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use ilevel_types::error::ExtractError;
use ilevel_types::record::{NormalizedRecord, RawRecord};
use ilevel_types::state::Watermark;
use ilevel_types::stream::{RetrievalStrategy, StreamDescriptor, StreamName};
use ilevel_types::window::Window;

use crate::batcher::IdBatcher;
use crate::bookmark::BookmarkStore;
use crate::emitter::Emitter;
use crate::errors::SyncError;
use crate::normalize::{normalize, RecordFilter};
use crate::periodic::PeriodicDataPipeline;
use crate::planner::WindowPlanner;
use crate::result::{RecordOutcome, StreamResult, StreamTally, UnitOutcome};
use crate::transport::Transport;

/// Time bounds shared by every stream of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunBounds {
    /// Used when a stream has no persisted watermark.
    pub start_date: Watermark,
    /// Fixed once at run start.
    pub end: NaiveDateTime,
}

impl RunBounds {
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.end.date()
    }
}

pub struct StreamDispatcher<'a> {
    pub(crate) transport: &'a dyn Transport,
    pub(crate) emitter: &'a mut dyn Emitter,
    pub(crate) bookmarks: &'a mut BookmarkStore,
    pub(crate) planner: WindowPlanner,
    pub(crate) batcher: IdBatcher,
    pub(crate) bounds: RunBounds,
}

impl<'a> StreamDispatcher<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        emitter: &'a mut dyn Emitter,
        bookmarks: &'a mut BookmarkStore,
        planner: WindowPlanner,
        batcher: IdBatcher,
        bounds: RunBounds,
    ) -> Self {
        Self {
            transport,
            emitter,
            bookmarks,
            planner,
            batcher,
            bounds,
        }
    }

    /// Sync one stream with its descriptor's strategy.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when state cannot be persisted or the emitter
    /// rejects a message. Transport and transform failures are absorbed
    /// into the returned tally.
    pub fn run_stream(&mut self, stream: &StreamDescriptor) -> Result<StreamResult, SyncError> {
        let started = Instant::now();
        tracing::info!(
            stream = stream.name.as_str(),
            strategy = stream.strategy.as_str(),
            "START syncing stream"
        );

        self.bookmarks.mark_syncing(Some(&stream.name))?;
        self.emitter.persist_state(self.bookmarks.snapshot())?;
        self.emitter.declare_schema(stream)?;

        let tally = match stream.strategy {
            RetrievalStrategy::FullSnapshot => self.full_snapshot(stream)?,
            RetrievalStrategy::IncrementalByChangedIds => self.incremental(stream)?,
            RetrievalStrategy::ExactDateMatch => self.exact_date(stream)?,
            RetrievalStrategy::TwoStagePeriodic => PeriodicDataPipeline::new(self).run(stream)?,
        };

        self.bookmarks.mark_syncing(None)?;
        self.emitter.persist_state(self.bookmarks.snapshot())?;

        let duration_secs = started.elapsed().as_secs_f64();
        tracing::info!(
            stream = stream.name.as_str(),
            emitted = tally.emitted,
            filtered = tally.filtered,
            failed_records = tally.failed_records,
            failed_units = tally.failed_units,
            elapsed_secs = duration_secs,
            "Processed a total of {} records",
            tally.emitted
        );

        Ok(StreamResult {
            stream: stream.name.clone(),
            strategy: stream.strategy,
            tally,
            duration_secs,
        })
    }

    fn full_snapshot(&mut self, stream: &StreamDescriptor) -> Result<StreamTally, SyncError> {
        let mut tally = StreamTally::default();
        match self.transport.fetch_snapshot(stream.entity) {
            Ok(records) => {
                tracing::info!(
                    stream = stream.name.as_str(),
                    count = records.len(),
                    "Retrieved snapshot"
                );
                for raw in &records {
                    let outcome = self.process_raw(&stream.name, raw, None)?;
                    tally.record(&outcome);
                }
                tally.unit(&if records.is_empty() {
                    UnitOutcome::Empty
                } else {
                    UnitOutcome::Completed
                });
            }
            Err(err) => tally.unit(&unit_failed(&stream.name, "snapshot", err)?),
        }
        Ok(tally)
    }

    fn incremental(&mut self, stream: &StreamDescriptor) -> Result<StreamTally, SyncError> {
        let mut tally = StreamTally::default();
        let start = self.bookmarks.get(&stream.name, self.bounds.start_date);
        let end_date = self.bounds.end_date();
        if start.date() >= end_date {
            tracing::info!(
                stream = stream.name.as_str(),
                watermark = %start,
                "Stream is current, nothing to sync"
            );
            return Ok(tally);
        }

        let windows = self.planner.windows(start.date(), end_date);
        tracing::info!(
            stream = stream.name.as_str(),
            windows = windows.len(),
            "Total number of date periods to process: {}",
            windows.len()
        );

        for (index, window) in windows.iter().enumerate() {
            tracing::info!(
                stream = stream.name.as_str(),
                window_start = %window.start(),
                window_end = %window.end(),
                "Processing date range {} of {}",
                index + 1,
                windows.len()
            );
            let watermark = self.bookmarks.get(&stream.name, start);
            let cutoff = watermark.max(Watermark::from_date(window.start()));
            let mut filter = stream
                .replication_key
                .as_ref()
                .map(|key| RecordFilter::new(key.clone(), cutoff));

            let outcome = self.changed_ids_window(stream, *window, filter.as_mut(), &mut tally)?;
            tally.unit(&outcome);

            let window_end = Watermark::from_date(window.end());
            let reached = filter
                .as_ref()
                .and_then(RecordFilter::newest)
                .map_or(window_end, |newest| newest.max(window_end));
            self.checkpoint(&stream.name, reached)?;
        }
        Ok(tally)
    }

    fn changed_ids_window(
        &mut self,
        stream: &StreamDescriptor,
        window: Window,
        mut filter: Option<&mut RecordFilter>,
        tally: &mut StreamTally,
    ) -> Result<UnitOutcome, SyncError> {
        let ids = match self.transport.list_changed_ids(stream.entity, window) {
            Ok(ids) => ids,
            Err(err) => return unit_failed(&stream.name, &window.to_string(), err),
        };
        if ids.is_empty() {
            tracing::info!(
                stream = stream.name.as_str(),
                window = %window,
                "No changed ids in window, skipping"
            );
            return Ok(UnitOutcome::Empty);
        }

        let batches = self.batcher.batch(&ids);
        tracing::debug!(
            stream = stream.name.as_str(),
            ids = ids.len(),
            batches = batches.len(),
            "Fetching changed objects"
        );
        for (index, batch) in batches.iter().enumerate() {
            let records = match self.transport.fetch_by_ids(stream.entity, batch) {
                Ok(records) => records,
                Err(err) => {
                    let unit = format!("{window} batch {}", index + 1);
                    tally.unit(&unit_failed(&stream.name, &unit, err)?);
                    continue;
                }
            };
            for raw in &records {
                let outcome = self.process_raw(&stream.name, raw, filter.as_deref_mut())?;
                tally.record(&outcome);
            }
        }
        Ok(UnitOutcome::Completed)
    }

    fn exact_date(&mut self, stream: &StreamDescriptor) -> Result<StreamTally, SyncError> {
        let mut tally = StreamTally::default();
        let days = pending_days(self.bookmarks.watermark(&stream.name), &self.bounds);
        if days.is_empty() {
            tracing::info!(stream = stream.name.as_str(), "Stream is current, nothing to sync");
            return Ok(tally);
        }

        for (index, day) in days.iter().enumerate() {
            tracing::info!(
                stream = stream.name.as_str(),
                day = %day,
                "Processing day {} of {}",
                index + 1,
                days.len()
            );
            let outcome = match self.transport.fetch_exact_date(stream.entity, *day) {
                Ok(records) if records.is_empty() => UnitOutcome::Empty,
                Ok(records) => {
                    for raw in &records {
                        let outcome = self.process_raw(&stream.name, raw, None)?;
                        tally.record(&outcome);
                    }
                    UnitOutcome::Completed
                }
                Err(err) => unit_failed(&stream.name, &day.to_string(), err)?,
            };
            tally.unit(&outcome);
            self.checkpoint(&stream.name, Watermark::from_date(*day))?;
        }
        Ok(tally)
    }

    fn process_raw(
        &mut self,
        stream: &StreamName,
        raw: &RawRecord,
        filter: Option<&mut RecordFilter>,
    ) -> Result<RecordOutcome, SyncError> {
        match normalize(raw) {
            Ok(record) => self.emit_record(stream, &record, filter),
            Err(err) => record_failed(stream, err),
        }
    }

    /// Filter and emit one normalized record.
    pub(crate) fn emit_record(
        &mut self,
        stream: &StreamName,
        record: &NormalizedRecord,
        filter: Option<&mut RecordFilter>,
    ) -> Result<RecordOutcome, SyncError> {
        if let Some(filter) = filter {
            match filter.accepts(record) {
                Ok(true) => {}
                Ok(false) => return Ok(RecordOutcome::Filtered),
                Err(err) => return record_failed(stream, err),
            }
        }
        self.emitter.emit(stream, record, Utc::now())?;
        Ok(RecordOutcome::Emitted)
    }

    /// Advance the stream's watermark and forward the new state downstream.
    pub(crate) fn checkpoint(
        &mut self,
        stream: &StreamName,
        value: Watermark,
    ) -> Result<(), SyncError> {
        if self.bookmarks.advance(stream, value)? {
            tracing::debug!(stream = stream.as_str(), watermark = %value, "Checkpoint");
            self.emitter.persist_state(self.bookmarks.snapshot())?;
        }
        Ok(())
    }
}

/// Days an exact-date stream still has to query, oldest first.
///
/// Resumes the day after the watermark, or at the start date when the
/// stream has never completed a day. The end day is included.
pub(crate) fn pending_days(watermark: Option<Watermark>, bounds: &RunBounds) -> Vec<NaiveDate> {
    let first_day = match watermark {
        Some(watermark) => watermark.date().succ_opt(),
        None => Some(bounds.start_date.date()),
    };
    let end_date = bounds.end_date();
    first_day
        .map(|first| first.iter_days().take_while(|d| *d <= end_date).collect())
        .unwrap_or_default()
}

/// Abort on run-scoped errors; anything narrower is absorbed by the caller.
fn escalate(stream: &StreamName, err: &ExtractError) -> Result<(), SyncError> {
    if !err.is_fatal() {
        return Ok(());
    }
    tracing::error!(
        stream = stream.as_str(),
        category = %err.category(),
        error = %err,
        "Fatal error, aborting run"
    );
    Err(SyncError::Config(err.clone()))
}

/// Log a failed unit of work and turn it into an outcome.
///
/// # Errors
///
/// Returns [`SyncError::Config`] when `err` is run-scoped.
pub(crate) fn unit_failed(
    stream: &StreamName,
    unit: &str,
    err: ExtractError,
) -> Result<UnitOutcome, SyncError> {
    escalate(stream, &err)?;
    tracing::error!(
        stream = stream.as_str(),
        unit,
        category = %err.category(),
        scope = %err.scope(),
        error = %err,
        "Unit failed, continuing with next unit"
    );
    Ok(UnitOutcome::Failed(err))
}

/// Log a skipped record and turn it into an outcome.
///
/// # Errors
///
/// Returns [`SyncError::Config`] when `err` is run-scoped.
pub(crate) fn record_failed(
    stream: &StreamName,
    err: ExtractError,
) -> Result<RecordOutcome, SyncError> {
    escalate(stream, &err)?;
    tracing::warn!(
        stream = stream.as_str(),
        category = %err.category(),
        scope = %err.scope(),
        error = %err,
        "Skipping record"
    );
    Ok(RecordOutcome::Failed(err))
}

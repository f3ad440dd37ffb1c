//! Run result types: per-record and per-unit outcomes and their tallies.

use ilevel_types::error::ExtractError;
use ilevel_types::stream::{RetrievalStrategy, StreamName};

/// What happened to one retrieved record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Emitted,
    /// Not newer than the stream's cutoff.
    Filtered,
    Failed(ExtractError),
}

/// What happened to one window, day, or id batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Completed,
    /// The service reported nothing to fetch.
    Empty,
    Failed(ExtractError),
}

/// Aggregate counts for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamTally {
    pub emitted: u64,
    pub filtered: u64,
    pub failed_records: u64,
    pub units_completed: u64,
    pub units_empty: u64,
    pub failed_units: u64,
}

impl StreamTally {
    pub fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Emitted => self.emitted += 1,
            RecordOutcome::Filtered => self.filtered += 1,
            RecordOutcome::Failed(_) => self.failed_records += 1,
        }
    }

    pub fn unit(&mut self, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::Completed => self.units_completed += 1,
            UnitOutcome::Empty => self.units_empty += 1,
            UnitOutcome::Failed(_) => self.failed_units += 1,
        }
    }

    pub fn absorb(&mut self, other: &StreamTally) {
        self.emitted += other.emitted;
        self.filtered += other.filtered;
        self.failed_records += other.failed_records;
        self.units_completed += other.units_completed;
        self.units_empty += other.units_empty;
        self.failed_units += other.failed_units;
    }

    /// Whether any record or unit was dropped because of an error.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed_records > 0 || self.failed_units > 0
    }
}

/// Result of syncing one stream.
#[derive(Debug, Clone)]
pub struct StreamResult {
    pub stream: StreamName,
    pub strategy: RetrievalStrategy,
    pub tally: StreamTally,
    pub duration_secs: f64,
}

/// Result of a full run.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub streams: Vec<StreamResult>,
    pub duration_secs: f64,
}

impl SyncResult {
    #[must_use]
    pub fn total_emitted(&self) -> u64 {
        self.streams.iter().map(|s| s.tally.emitted).sum()
    }

    #[must_use]
    pub fn totals(&self) -> StreamTally {
        let mut total = StreamTally::default();
        for stream in &self.streams {
            total.absorb(&stream.tally);
        }
        total
    }

    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamResult> {
        self.streams.iter().find(|s| s.stream.as_str() == name)
    }
}

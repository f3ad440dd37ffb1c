//! Query windows and identifier batches.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive calendar-date range passed to a single span-limited query.
///
/// Invariant: `end >= start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    start: NaiveDate,
    end: NaiveDate,
}

impl Window {
    /// Build a window, returning `None` when `end` precedes `start`.
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (end >= start).then_some(Self { start, end })
    }

    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whole days between `start` and `end`.
    #[must_use]
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Whether `date` falls inside the window (both ends inclusive).
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Ordered, size-bounded slice of opaque integer identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdBatch(Vec<i64>);

impl IdBatch {
    #[must_use]
    pub fn new(ids: Vec<i64>) -> Self {
        Self(ids)
    }

    #[must_use]
    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<i64>> for IdBatch {
    fn from(ids: Vec<i64>) -> Self {
        Self(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn window_rejects_inverted_range() {
        assert!(Window::new(d(2023, 1, 2), d(2023, 1, 1)).is_none());
        assert!(Window::new(d(2023, 1, 1), d(2023, 1, 1)).is_some());
    }

    #[test]
    fn window_span_and_contains() {
        let w = Window::new(d(2023, 1, 1), d(2023, 1, 31)).unwrap();
        assert_eq!(w.span_days(), 30);
        assert!(w.contains(d(2023, 1, 1)));
        assert!(w.contains(d(2023, 1, 31)));
        assert!(!w.contains(d(2023, 2, 1)));
        assert_eq!(w.to_string(), "2023-01-01..2023-01-31");
    }

    #[test]
    fn id_batch_serializes_as_array() {
        let batch = IdBatch::from(vec![3, 1, 2]);
        assert_eq!(serde_json::to_string(&batch).unwrap(), "[3,1,2]");
        assert_eq!(batch.len(), 3);
    }
}

//! Date-range windowing for span-limited queries.
//!
//! The changed-objects query rejects ranges longer than a fixed number of
//! days, so an arbitrary `[start, end]` is cut into consecutive windows.
//! Adjacent windows share their boundary date; callers filter on the
//! watermark so the shared point is not emitted twice.

use std::num::NonZeroU32;

use chrono::{Duration, NaiveDate};
use ilevel_types::window::Window;

/// Default maximum span accepted by the changed-objects query.
pub const DEFAULT_MAX_SPAN_DAYS: u32 = 30;

/// Splits date ranges into windows no longer than `max_span_days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlanner {
    max_span_days: NonZeroU32,
}

impl WindowPlanner {
    #[must_use]
    pub fn new(max_span_days: NonZeroU32) -> Self {
        Self { max_span_days }
    }

    #[must_use]
    pub fn max_span_days(&self) -> u32 {
        self.max_span_days.get()
    }

    /// Boundary points for `[start, end]`.
    ///
    /// Consecutive pairs form the windows. `start == end` yields the
    /// degenerate `[start, end]` pair; `end < start` yields nothing.
    #[must_use]
    pub fn plan(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        if end < start {
            return Vec::new();
        }

        let step = Duration::days(i64::from(self.max_span_days.get()));
        if (end - start) < step {
            return vec![start, end];
        }

        let mut boundaries = vec![start];
        let mut next = start;
        loop {
            next += step;
            if next >= end {
                boundaries.push(end);
                return boundaries;
            }
            boundaries.push(next);
        }
    }

    /// The windows formed by [`plan`](Self::plan), in chronological order.
    #[must_use]
    pub fn windows(&self, start: NaiveDate, end: NaiveDate) -> Vec<Window> {
        self.plan(start, end)
            .windows(2)
            .filter_map(|pair| Window::new(pair[0], pair[1]))
            .collect()
    }
}

impl Default for WindowPlanner {
    fn default() -> Self {
        Self::new(NonZeroU32::new(DEFAULT_MAX_SPAN_DAYS).unwrap_or(NonZeroU32::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn planner(days: u32) -> WindowPlanner {
        WindowPlanner::new(NonZeroU32::new(days).unwrap())
    }

    #[test]
    fn short_range_is_single_window() {
        let bounds = planner(30).plan(d(2023, 1, 1), d(2023, 1, 15));
        assert_eq!(bounds, vec![d(2023, 1, 1), d(2023, 1, 15)]);
    }

    #[test]
    fn long_range_is_chunked_and_clamped() {
        let windows = planner(30).windows(d(2023, 1, 1), d(2023, 3, 15));
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].start(), d(2023, 1, 1));
        assert_eq!(windows[0].end(), d(2023, 1, 31));
        assert_eq!(windows[1].start(), d(2023, 1, 31));
        assert_eq!(windows[1].end(), d(2023, 3, 2));
        assert_eq!(windows[2].start(), d(2023, 3, 2));
        assert_eq!(windows[2].end(), d(2023, 3, 15));
        assert!(windows.iter().all(|w| w.span_days() <= 30));
    }

    #[test]
    fn exact_multiple_of_span_has_no_empty_tail() {
        let bounds = planner(30).plan(d(2023, 1, 1), d(2023, 3, 2));
        assert_eq!(bounds, vec![d(2023, 1, 1), d(2023, 1, 31), d(2023, 3, 2)]);
    }

    #[test]
    fn span_equal_to_range_is_single_window() {
        let bounds = planner(30).plan(d(2023, 1, 1), d(2023, 1, 31));
        assert_eq!(bounds, vec![d(2023, 1, 1), d(2023, 1, 31)]);
    }

    #[test]
    fn same_day_yields_degenerate_pair() {
        let bounds = planner(30).plan(d(2023, 1, 1), d(2023, 1, 1));
        assert_eq!(bounds, vec![d(2023, 1, 1), d(2023, 1, 1)]);
    }

    #[test]
    fn inverted_range_yields_nothing() {
        assert!(planner(30).plan(d(2023, 2, 1), d(2023, 1, 1)).is_empty());
        assert!(planner(30).windows(d(2023, 2, 1), d(2023, 1, 1)).is_empty());
    }

    #[test]
    fn one_day_span() {
        let windows = planner(1).windows(d(2023, 1, 1), d(2023, 1, 4));
        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| w.span_days() == 1));
    }

    #[test]
    fn default_span_is_thirty_days() {
        assert_eq!(WindowPlanner::default().max_span_days(), 30);
    }
}

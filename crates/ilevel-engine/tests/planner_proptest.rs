use std::num::{NonZeroU32, NonZeroUsize};

use chrono::{Duration, NaiveDate};
use ilevel_engine::batcher::IdBatcher;
use ilevel_engine::config::{parser, validator};
use ilevel_engine::planner::WindowPlanner;
use ilevel_engine::plan_streams;
use ilevel_types::state::{SyncState, Watermark};
use ilevel_types::stream::StreamName;
use proptest::prelude::*;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

proptest! {
    #[test]
    fn windows_cover_range_without_gaps(
        start_offset in 0_i64..1500,
        length in 1_i64..2000,
        span in 1_u32..120,
    ) {
        let start = base_date() + Duration::days(start_offset);
        let end = start + Duration::days(length);
        let windows = WindowPlanner::new(NonZeroU32::new(span).unwrap()).windows(start, end);

        prop_assert!(!windows.is_empty());
        prop_assert_eq!(windows[0].start(), start);
        prop_assert_eq!(windows[windows.len() - 1].end(), end);
        for window in &windows {
            prop_assert!(window.start() <= window.end());
            prop_assert!((window.end() - window.start()).num_days() <= i64::from(span));
        }
        for pair in windows.windows(2) {
            prop_assert_eq!(pair[0].end(), pair[1].start());
        }
    }

    #[test]
    fn batches_preserve_ids_and_respect_limit(
        ids in proptest::collection::vec(any::<i64>(), 0..500),
        limit in 1_usize..64,
    ) {
        let batches = IdBatcher::new(NonZeroUsize::new(limit).unwrap()).batch(&ids);

        prop_assert!(!batches.is_empty());
        let rejoined: Vec<i64> = batches.iter().flat_map(|b| b.ids().to_vec()).collect();
        prop_assert_eq!(rejoined, ids);
        for batch in &batches {
            prop_assert!(batch.len() <= limit);
        }
        for batch in &batches[..batches.len() - 1] {
            prop_assert_eq!(batch.len(), limit);
        }
    }

    #[test]
    fn zero_limits_are_rejected(span in 0_u32..3, batch in 0_usize..3) {
        let yaml = format!(
            "start_date: \"2023-01-01\"\nmax_span_days: {span}\nmax_id_batch_size: {batch}\n"
        );
        let config = parser::parse_config_str(&yaml).expect("generated yaml must parse");
        let result = validator::validate_config(&config);

        if span == 0 || batch == 0 {
            prop_assert!(result.is_err());
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn exact_date_plan_counts_remaining_days(done in 0_i64..60, total in 1_i64..60) {
        let start = base_date();
        let end = start + Duration::days(total);
        let yaml = format!(
            "start_date: \"{start}\"\nend_date: \"{end}\"\nstreams: [investment_transactions]\n"
        );
        let settings = validator::validate_config(&parser::parse_config_str(&yaml).unwrap()).unwrap();

        let mut state = SyncState::default();
        let watermark = start + Duration::days(done);
        state.bookmarks.insert(
            StreamName::new("investment_transactions"),
            Watermark::from_date(watermark),
        );
        let plan = plan_streams(&settings, &state, end.and_time(chrono::NaiveTime::MIN));

        let expected = usize::try_from((end - watermark).num_days().max(0)).unwrap();
        prop_assert_eq!(plan[0].units, expected);
    }
}

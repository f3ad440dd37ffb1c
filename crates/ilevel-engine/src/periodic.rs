//! Two-stage periodic data retrieval.
//!
//! Base entity ids are resolved once, then for every window and every base
//! id batch the service translates them into standardized data ids changed
//! in that window. Those ids are batched again (the cardinality differs)
//! and their values fetched. The same base batch is queried once per window
//! because the base-to-standardized mapping is time-scoped.
//!
//! Adjacent windows share their boundary day, so an id changed on that day
//! is translated twice. Values already fetched earlier in the run are not
//! fetched or emitted again.

use std::collections::HashSet;

use ilevel_types::record::RawRecord;
use ilevel_types::state::Watermark;
use ilevel_types::stream::StreamDescriptor;
use ilevel_types::window::{IdBatch, Window};

use crate::dispatcher::{record_failed, unit_failed, StreamDispatcher};
use crate::errors::SyncError;
use crate::normalize::normalize_data_value;
use crate::result::{StreamTally, UnitOutcome};

const BASE_ID_ATTRIBUTES: [&str; 2] = ["Id", "id"];

fn base_id(record: &RawRecord) -> Option<i64> {
    BASE_ID_ATTRIBUTES
        .iter()
        .find_map(|key| record.attribute(key))
        .and_then(serde_json::Value::as_i64)
}

pub struct PeriodicDataPipeline<'d, 'a> {
    dispatcher: &'d mut StreamDispatcher<'a>,
    /// Standardized ids whose values were fetched during this run.
    fetched: HashSet<i64>,
}

impl<'d, 'a> PeriodicDataPipeline<'d, 'a> {
    pub fn new(dispatcher: &'d mut StreamDispatcher<'a>) -> Self {
        Self {
            dispatcher,
            fetched: HashSet::new(),
        }
    }

    /// # Errors
    ///
    /// Returns [`SyncError`] on state or sink failure only.
    pub fn run(&mut self, stream: &StreamDescriptor) -> Result<StreamTally, SyncError> {
        let mut tally = StreamTally::default();
        let d = &mut *self.dispatcher;
        let start = d.bookmarks.get(&stream.name, d.bounds.start_date);
        let end_date = d.bounds.end_date();
        if start.date() >= end_date {
            tracing::info!(
                stream = stream.name.as_str(),
                watermark = %start,
                "Stream is current, nothing to sync"
            );
            return Ok(tally);
        }

        let Some(base_ids) = self.resolve_base_ids(stream, &mut tally)? else {
            return Ok(tally);
        };
        if base_ids.is_empty() {
            tracing::info!(
                stream = stream.name.as_str(),
                entity = %stream.entity,
                "No base entities found"
            );
            return Ok(tally);
        }

        let d = &mut *self.dispatcher;
        let base_batches = d.batcher.batch(&base_ids);
        let windows = d.planner.windows(start.date(), end_date);
        tracing::info!(
            stream = stream.name.as_str(),
            base_ids = base_ids.len(),
            base_batches = base_batches.len(),
            windows = windows.len(),
            "Resolved base entities"
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
            for (batch_index, batch) in base_batches.iter().enumerate() {
                let outcome = self.window_batch(stream, *window, batch_index, batch, &mut tally)?;
                tally.unit(&outcome);
            }
            self.dispatcher
                .checkpoint(&stream.name, Watermark::from_date(window.end()))?;
        }
        Ok(tally)
    }

    /// Every base entity id, or `None` when the lookup itself failed.
    fn resolve_base_ids(
        &mut self,
        stream: &StreamDescriptor,
        tally: &mut StreamTally,
    ) -> Result<Option<Vec<i64>>, SyncError> {
        let records = match self.dispatcher.transport.fetch_snapshot(stream.entity) {
            Ok(records) => records,
            Err(err) => {
                tally.unit(&unit_failed(&stream.name, "base entity lookup", err)?);
                return Ok(None);
            }
        };
        let mut ids = Vec::with_capacity(records.len());
        for record in &records {
            match base_id(record) {
                Some(id) => ids.push(id),
                None => tracing::warn!(
                    stream = stream.name.as_str(),
                    record = %record.as_value(),
                    "Base entity without integer id, skipping"
                ),
            }
        }
        Ok(Some(ids))
    }

    fn window_batch(
        &mut self,
        stream: &StreamDescriptor,
        window: Window,
        batch_index: usize,
        batch: &IdBatch,
        tally: &mut StreamTally,
    ) -> Result<UnitOutcome, SyncError> {
        let d = &mut *self.dispatcher;
        let unit = format!("{window} base batch {}", batch_index + 1);
        let standardized = match d.transport.translate_to_standardized_ids(window, batch) {
            Ok(ids) => ids,
            Err(err) => return unit_failed(&stream.name, &unit, err),
        };
        let mut pending = Vec::with_capacity(standardized.len());
        for id in standardized {
            if !self.fetched.contains(&id) && !pending.contains(&id) {
                pending.push(id);
            }
        }
        if pending.is_empty() {
            tracing::debug!(
                stream = stream.name.as_str(),
                unit = unit.as_str(),
                "No new standardized ids"
            );
            return Ok(UnitOutcome::Empty);
        }

        for (value_index, value_batch) in d.batcher.batch(&pending).iter().enumerate() {
            let items = match d.transport.fetch_standardized_values(value_batch) {
                Ok(items) => items,
                Err(err) => {
                    let value_unit = format!("{unit} value batch {}", value_index + 1);
                    tally.unit(&unit_failed(&stream.name, &value_unit, err)?);
                    continue;
                }
            };
            self.fetched.extend(value_batch.ids());
            tracing::info!(
                stream = stream.name.as_str(),
                count = items.len(),
                "Retrieved a total of {} data values",
                items.len()
            );
            for item in &items {
                let outcome = match normalize_data_value(item) {
                    Ok(record) => d.emit_record(&stream.name, &record, None)?,
                    Err(err) => record_failed(&stream.name, err)?,
                };
                tally.record(&outcome);
            }
        }
        Ok(UnitOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use std::num::{NonZeroU32, NonZeroUsize};
    use std::sync::Arc;

    use ilevel_state::MemoryStateBackend;
    use ilevel_types::catalog::find_stream;
    use ilevel_types::stream::StreamName;

    use super::*;
    use crate::batcher::IdBatcher;
    use crate::bookmark::BookmarkStore;
    use crate::dispatcher::RunBounds;
    use crate::emitter::JsonLinesEmitter;
    use crate::planner::WindowPlanner;
    use crate::transport::{Operation, ReplayTransport, TransportCall};

    const DOC: &str = r#"{
        "entities": {"asset": [{"Id": 1}, {"Id": 2}, {"Id": 3}, {"Name": "no id"}]},
        "standardized": [
            {"entity_id": 1, "changed": "2023-01-05",
             "data": {"standardized_data_id": 100, "data_item_id": 7, "period_end": "2022-12-31",
                      "reported_date": "2023-01-05", "value": 10.5}},
            {"entity_id": 3, "changed": "2023-01-20",
             "data": {"standardized_data_id": 101, "data_item_id": 7, "period_end": "2022-12-31",
                      "reported_date": "bad date", "value": 1}},
            {"entity_id": 2, "changed": "2023-01-20",
             "data": {"standardized_data_id": 102, "data_item_id": 8, "period_end": "2022-12-31",
                      "reported_date": "2023-01-20", "value": "n/a"}}
        ]
    }"#;

    fn run(transport: &ReplayTransport) -> (StreamTally, BookmarkStore) {
        let backend = Arc::new(MemoryStateBackend::new());
        let mut bookmarks = BookmarkStore::load(backend).unwrap();
        let mut emitter = JsonLinesEmitter::new(Vec::new());
        let tally = {
            let mut dispatcher = StreamDispatcher::new(
                transport,
                &mut emitter,
                &mut bookmarks,
                WindowPlanner::new(NonZeroU32::new(10).unwrap()),
                IdBatcher::new(NonZeroUsize::new(2).unwrap()),
                RunBounds {
                    start_date: Watermark::parse("2023-01-01").unwrap(),
                    end: Watermark::parse("2023-01-21").unwrap().value(),
                },
            );
            PeriodicDataPipeline::new(&mut dispatcher)
                .run(&find_stream("asset_periodic_data").unwrap())
                .unwrap()
        };
        (tally, bookmarks)
    }

    #[test]
    fn queries_every_base_batch_in_every_window() {
        let transport = ReplayTransport::from_json_str(DOC).unwrap();
        let (tally, bookmarks) = run(&transport);

        // 2 windows x 2 base batches ([1, 2], [3]).
        assert_eq!(transport.call_count(Operation::FetchSnapshot), 1);
        assert_eq!(transport.call_count(Operation::TranslateToStandardizedIds), 4);
        assert_eq!(tally.emitted, 2);
        assert_eq!(tally.failed_records, 1);
        assert_eq!(
            bookmarks.watermark(&StreamName::new("asset_periodic_data")),
            Some(Watermark::parse("2023-01-21").unwrap())
        );
    }

    #[test]
    fn translation_windows_are_chronological() {
        let transport = ReplayTransport::from_json_str(DOC).unwrap();
        run(&transport);
        let starts: Vec<_> = transport
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::TranslateToStandardizedIds { window, .. } => Some(window.start()),
                _ => None,
            })
            .collect();
        assert!(starts.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn failed_translation_zeroes_only_that_unit() {
        let doc = DOC.replacen(
            "\"standardized\"",
            "\"failures\": [{\"operation\": \"translate_to_standardized_ids\", \"id\": 1, \"window_start\": \"2023-01-01\"}],\n\"standardized\"",
            1,
        );
        let transport = ReplayTransport::from_json_str(&doc).unwrap();
        let (tally, _) = run(&transport);
        assert_eq!(tally.failed_units, 1);
        // Only the value for entity 1 (first window) is lost.
        assert_eq!(tally.emitted, 1);
    }

    #[test]
    fn boundary_day_value_is_fetched_once() {
        let transport = ReplayTransport::from_json_str(
            r#"{
                "entities": {"asset": [{"Id": 1}]},
                "standardized": [
                    {"entity_id": 1, "changed": "2023-01-11",
                     "data": {"standardized_data_id": 300, "data_item_id": 7,
                              "period_end": "2022-12-31", "reported_date": "2023-01-11", "value": 5}}
                ]
            }"#,
        )
        .unwrap();
        let (tally, _) = run(&transport);

        // 01-11 is in both 01-01..01-11 and 01-11..01-21.
        assert_eq!(transport.call_count(Operation::TranslateToStandardizedIds), 2);
        assert_eq!(transport.call_count(Operation::FetchStandardizedValues), 1);
        assert_eq!(tally.emitted, 1);
        assert_eq!(tally.units_empty, 1);
    }

    #[test]
    fn base_lookup_failure_leaves_watermark_untouched() {
        let transport = ReplayTransport::from_json_str(
            r#"{"failures": [{"operation": "fetch_snapshot", "entity": "asset"}]}"#,
        )
        .unwrap();
        let (tally, bookmarks) = run(&transport);
        assert_eq!(tally.failed_units, 1);
        assert!(bookmarks
            .watermark(&StreamName::new("asset_periodic_data"))
            .is_none());
        assert_eq!(transport.call_count(Operation::TranslateToStandardizedIds), 0);
    }
}

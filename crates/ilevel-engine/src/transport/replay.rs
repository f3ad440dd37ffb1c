//! Offline [`Transport`] that answers from a captured JSON document.
//!
//! Document layout:
//!
//! ```json
//! {
//!   "entities":     { "asset": [ { "Id": 1, "LastModifiedDate": "2023-01-05T10:00:00", ... } ] },
//!   "exact_date":   { "investment_transaction": { "2023-01-02": [ { "Id": 7, ... } ] } },
//!   "standardized": [ { "entity_id": 1, "changed": "2023-01-10", "data": { ... } } ],
//!   "failures":     [ { "operation": "list_changed_ids", "entity": "asset", "window_start": "2023-01-31" } ]
//! }
//! ```
//!
//! Changed-id queries select entities whose `LastModifiedDate` falls inside
//! the window (both ends inclusive). Every call is recorded so tests can
//! assert on the exact query sequence.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use ilevel_types::datetime::parse_naive_datetime;
use ilevel_types::error::ExtractError;
use ilevel_types::record::{DataValue, RawRecord};
use ilevel_types::stream::EntityKind;
use ilevel_types::window::{IdBatch, Window};
use serde::Deserialize;

use super::{Transport, TransportResult};

const ID_ATTRIBUTE: &str = "Id";
const CHANGED_ATTRIBUTE: &str = "LastModifiedDate";

/// Transport operation name, as used in failure rules and the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListChangedIds,
    FetchByIds,
    FetchSnapshot,
    FetchExactDate,
    TranslateToStandardizedIds,
    FetchStandardizedValues,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListChangedIds => "list_changed_ids",
            Self::FetchByIds => "fetch_by_ids",
            Self::FetchSnapshot => "fetch_snapshot",
            Self::FetchExactDate => "fetch_exact_date",
            Self::TranslateToStandardizedIds => "translate_to_standardized_ids",
            Self::FetchStandardizedValues => "fetch_standardized_values",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FailureKind {
    #[default]
    Transport,
    Malformed,
    /// Service rejected the run's settings, e.g. credentials.
    Config,
}

/// Injected failure. Unset selectors match anything.
#[derive(Debug, Clone, Deserialize)]
struct FailureRule {
    operation: Operation,
    #[serde(default)]
    entity: Option<EntityKind>,
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default)]
    window_start: Option<NaiveDate>,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    kind: FailureKind,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StandardizedEntry {
    entity_id: i64,
    changed: NaiveDate,
    data: DataValue,
}

/// Captured service responses plus failure rules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayDocument {
    #[serde(default)]
    entities: BTreeMap<String, Vec<RawRecord>>,
    #[serde(default)]
    exact_date: BTreeMap<String, BTreeMap<String, Vec<RawRecord>>>,
    #[serde(default)]
    standardized: Vec<StandardizedEntry>,
    #[serde(default)]
    failures: Vec<FailureRule>,
}

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    ListChangedIds { entity: EntityKind, window: Window },
    FetchByIds { entity: EntityKind, ids: usize },
    FetchSnapshot { entity: EntityKind },
    FetchExactDate { entity: EntityKind, date: NaiveDate },
    TranslateToStandardizedIds { window: Window, ids: usize },
    FetchStandardizedValues { ids: usize },
}

impl TransportCall {
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::ListChangedIds { .. } => Operation::ListChangedIds,
            Self::FetchByIds { .. } => Operation::FetchByIds,
            Self::FetchSnapshot { .. } => Operation::FetchSnapshot,
            Self::FetchExactDate { .. } => Operation::FetchExactDate,
            Self::TranslateToStandardizedIds { .. } => Operation::TranslateToStandardizedIds,
            Self::FetchStandardizedValues { .. } => Operation::FetchStandardizedValues,
        }
    }
}

/// What a single call is about, for failure-rule matching.
#[derive(Default)]
struct CallScope<'a> {
    entity: Option<EntityKind>,
    date: Option<NaiveDate>,
    window: Option<Window>,
    ids: Option<&'a [i64]>,
}

impl FailureRule {
    fn matches(&self, operation: Operation, scope: &CallScope<'_>) -> bool {
        self.operation == operation
            && self.entity.map_or(true, |e| scope.entity == Some(e))
            && self.date.map_or(true, |d| scope.date == Some(d))
            && self
                .window_start
                .map_or(true, |d| scope.window.is_some_and(|w| w.start() == d))
            && self
                .id
                .map_or(true, |id| scope.ids.is_some_and(|ids| ids.contains(&id)))
    }

    fn to_error(&self) -> ExtractError {
        let op = self.operation.as_str();
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| "injected failure".to_string());
        match self.kind {
            FailureKind::Transport => ExtractError::transport(op, message),
            FailureKind::Malformed => ExtractError::malformed(op, message),
            FailureKind::Config => ExtractError::config(format!("{op}: {message}")),
        }
    }
}

/// [`Transport`] backed by a [`ReplayDocument`].
#[derive(Debug, Default)]
pub struct ReplayTransport {
    document: ReplayDocument,
    calls: RefCell<Vec<TransportCall>>,
}

impl ReplayTransport {
    #[must_use]
    pub fn new(document: ReplayDocument) -> Self {
        Self {
            document,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Parse a replay document from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a replay document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: ReplayDocument =
            serde_json::from_str(json).context("Failed to parse replay document")?;
        Ok(Self::new(document))
    }

    /// Load a replay document from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file: {}", path.display()))?;
        Self::from_json_str(&content)
    }

    /// Every call issued so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.borrow().clone()
    }

    /// Number of calls issued for `operation`.
    #[must_use]
    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    fn record(&self, call: TransportCall, scope: &CallScope<'_>) -> TransportResult<()> {
        let operation = call.operation();
        self.calls.borrow_mut().push(call);
        match self
            .document
            .failures
            .iter()
            .find(|rule| rule.matches(operation, scope))
        {
            Some(rule) => Err(rule.to_error()),
            None => Ok(()),
        }
    }

    fn entities(&self, entity: EntityKind) -> &[RawRecord] {
        self.document
            .entities
            .get(entity.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn record_id(record: &RawRecord, operation: Operation) -> TransportResult<i64> {
    record
        .attribute(ID_ATTRIBUTE)
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| {
            ExtractError::malformed(
                operation.as_str(),
                format!("object without integer '{ID_ATTRIBUTE}': {}", record.as_value()),
            )
        })
}

impl Transport for ReplayTransport {
    fn list_changed_ids(&self, entity: EntityKind, window: Window) -> TransportResult<Vec<i64>> {
        let op = Operation::ListChangedIds;
        self.record(
            TransportCall::ListChangedIds { entity, window },
            &CallScope {
                entity: Some(entity),
                window: Some(window),
                ..CallScope::default()
            },
        )?;

        let mut ids = Vec::new();
        for record in self.entities(entity) {
            let changed = record
                .attribute(CHANGED_ATTRIBUTE)
                .and_then(serde_json::Value::as_str)
                .and_then(parse_naive_datetime);
            if changed.is_some_and(|dt| window.contains(dt.date())) {
                ids.push(record_id(record, op)?);
            }
        }
        Ok(ids)
    }

    fn fetch_by_ids(&self, entity: EntityKind, batch: &IdBatch) -> TransportResult<Vec<RawRecord>> {
        let op = Operation::FetchByIds;
        self.record(
            TransportCall::FetchByIds {
                entity,
                ids: batch.len(),
            },
            &CallScope {
                entity: Some(entity),
                ids: Some(batch.ids()),
                ..CallScope::default()
            },
        )?;

        let mut records = Vec::new();
        for record in self.entities(entity) {
            if batch.ids().contains(&record_id(record, op)?) {
                records.push(record.clone());
            }
        }
        Ok(records)
    }

    fn fetch_snapshot(&self, entity: EntityKind) -> TransportResult<Vec<RawRecord>> {
        self.record(
            TransportCall::FetchSnapshot { entity },
            &CallScope {
                entity: Some(entity),
                ..CallScope::default()
            },
        )?;
        Ok(self.entities(entity).to_vec())
    }

    fn fetch_exact_date(
        &self,
        entity: EntityKind,
        date: NaiveDate,
    ) -> TransportResult<Vec<RawRecord>> {
        self.record(
            TransportCall::FetchExactDate { entity, date },
            &CallScope {
                entity: Some(entity),
                date: Some(date),
                ..CallScope::default()
            },
        )?;
        Ok(self
            .document
            .exact_date
            .get(entity.as_str())
            .and_then(|by_day| by_day.get(&date.format("%Y-%m-%d").to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn translate_to_standardized_ids(
        &self,
        window: Window,
        batch: &IdBatch,
    ) -> TransportResult<Vec<i64>> {
        self.record(
            TransportCall::TranslateToStandardizedIds {
                window,
                ids: batch.len(),
            },
            &CallScope {
                window: Some(window),
                ids: Some(batch.ids()),
                ..CallScope::default()
            },
        )?;

        let mut ids: Vec<i64> = Vec::new();
        for entry in &self.document.standardized {
            let id = entry.data.standardized_data_id;
            if batch.ids().contains(&entry.entity_id)
                && window.contains(entry.changed)
                && !ids.contains(&id)
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn fetch_standardized_values(&self, batch: &IdBatch) -> TransportResult<Vec<DataValue>> {
        self.record(
            TransportCall::FetchStandardizedValues { ids: batch.len() },
            &CallScope {
                ids: Some(batch.ids()),
                ..CallScope::default()
            },
        )?;
        Ok(self
            .document
            .standardized
            .iter()
            .filter(|entry| batch.ids().contains(&entry.data.standardized_data_id))
            .map(|entry| entry.data.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use ilevel_types::error::ErrorCategory;

    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn window(start: NaiveDate, end: NaiveDate) -> Window {
        Window::new(start, end).unwrap()
    }

    const DOC: &str = r#"{
        "entities": {
            "asset": [
                {"Id": 1, "Name": "A", "LastModifiedDate": "2023-01-05T10:00:00"},
                {"Id": 2, "Name": "B", "LastModifiedDate": "2023-02-10T08:00:00"},
                {"Id": 3, "Name": "C", "LastModifiedDate": "2023-01-31T00:00:00"}
            ]
        },
        "exact_date": {
            "investment_transaction": {"2023-01-02": [{"Id": 70}]}
        },
        "standardized": [
            {"entity_id": 1, "changed": "2023-01-10",
             "data": {"standardized_data_id": 500, "data_item_id": 9,
                      "period_end": "2023-03-31", "reported_date": "2023-04-01", "value": 1}},
            {"entity_id": 2, "changed": "2023-03-01",
             "data": {"standardized_data_id": 501, "data_item_id": 9,
                      "period_end": "2023-03-31", "reported_date": "2023-04-01", "value": 2}}
        ],
        "failures": [
            {"operation": "fetch_exact_date", "date": "2023-01-03", "message": "timeout"},
            {"operation": "fetch_by_ids", "id": 3, "kind": "malformed"}
        ]
    }"#;

    #[test]
    fn changed_ids_respect_window_bounds() {
        let transport = ReplayTransport::from_json_str(DOC).unwrap();
        let ids = transport
            .list_changed_ids(EntityKind::Asset, window(d(2023, 1, 1), d(2023, 1, 31)))
            .unwrap();
        assert_eq!(ids, vec![1, 3]);
        let none = transport
            .list_changed_ids(EntityKind::Fund, window(d(2023, 1, 1), d(2023, 1, 31)))
            .unwrap();
        assert!(none.is_empty());
        assert_eq!(transport.call_count(Operation::ListChangedIds), 2);
    }

    #[test]
    fn exact_date_lookup_and_injected_failure() {
        let transport = ReplayTransport::from_json_str(DOC).unwrap();
        let kind = EntityKind::InvestmentTransaction;
        assert_eq!(transport.fetch_exact_date(kind, d(2023, 1, 2)).unwrap().len(), 1);
        assert!(transport.fetch_exact_date(kind, d(2023, 1, 1)).unwrap().is_empty());

        let err = transport.fetch_exact_date(kind, d(2023, 1, 3)).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Transport);
        assert!(err.to_string().contains("timeout"));
        assert_eq!(transport.calls().len(), 3);
    }

    #[test]
    fn fetch_by_ids_failure_matches_batch_membership() {
        let transport = ReplayTransport::from_json_str(DOC).unwrap();
        let ok = transport
            .fetch_by_ids(EntityKind::Asset, &IdBatch::new(vec![1, 2]))
            .unwrap();
        assert_eq!(ok.len(), 2);

        let err = transport
            .fetch_by_ids(EntityKind::Asset, &IdBatch::new(vec![2, 3]))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::MalformedResponse);
    }

    #[test]
    fn standardized_translation_is_window_scoped() {
        let transport = ReplayTransport::from_json_str(DOC).unwrap();
        let batch = IdBatch::new(vec![1, 2]);
        let jan = transport
            .translate_to_standardized_ids(window(d(2023, 1, 1), d(2023, 1, 31)), &batch)
            .unwrap();
        assert_eq!(jan, vec![500]);
        let mar = transport
            .translate_to_standardized_ids(window(d(2023, 2, 15), d(2023, 3, 15)), &batch)
            .unwrap();
        assert_eq!(mar, vec![501]);

        let values = transport
            .fetch_standardized_values(&IdBatch::new(vec![500, 501]))
            .unwrap();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn record_without_id_is_malformed() {
        let transport = ReplayTransport::from_json_str(
            r#"{"entities": {"fund": [{"LastModifiedDate": "2023-01-02"}]}}"#,
        )
        .unwrap();
        let err = transport
            .list_changed_ids(EntityKind::Fund, window(d(2023, 1, 1), d(2023, 1, 5)))
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::MalformedResponse);
    }

    #[test]
    fn rejects_invalid_document() {
        assert!(ReplayTransport::from_json_str("{\"entities\": 5}").is_err());
    }
}

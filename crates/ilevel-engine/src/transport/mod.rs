//! Remote service boundary.
//!
//! The engine talks to the service only through [`Transport`]. Every call
//! is blocking and bounded by the caller: windows never exceed the span
//! limit and id batches never exceed the batch limit. Failures come back as
//! [`ExtractError::Transport`] or [`ExtractError::MalformedResponse`] and are
//! scoped to the unit that issued the call.

pub mod replay;

use chrono::NaiveDate;
use ilevel_types::error::ExtractError;
use ilevel_types::record::{DataValue, RawRecord};
use ilevel_types::stream::EntityKind;
use ilevel_types::window::{IdBatch, Window};

pub use replay::{Operation, ReplayDocument, ReplayTransport, TransportCall};

pub type TransportResult<T> = Result<T, ExtractError>;

/// Blocking client for the six query operations the engine needs.
pub trait Transport {
    /// Ids of `entity` objects changed inside `window`, in service order.
    fn list_changed_ids(&self, entity: EntityKind, window: Window) -> TransportResult<Vec<i64>>;

    /// Full objects for the ids in `batch`.
    fn fetch_by_ids(&self, entity: EntityKind, batch: &IdBatch) -> TransportResult<Vec<RawRecord>>;

    /// Every current object of `entity`, unfiltered.
    fn fetch_snapshot(&self, entity: EntityKind) -> TransportResult<Vec<RawRecord>>;

    /// Objects of `entity` whose date equals `date` exactly.
    fn fetch_exact_date(&self, entity: EntityKind, date: NaiveDate)
        -> TransportResult<Vec<RawRecord>>;

    /// Standardized data ids reachable from the base ids in `batch` that
    /// changed inside `window`.
    fn translate_to_standardized_ids(
        &self,
        window: Window,
        batch: &IdBatch,
    ) -> TransportResult<Vec<i64>>;

    /// Measurement values for the standardized ids in `batch`.
    fn fetch_standardized_values(&self, batch: &IdBatch) -> TransportResult<Vec<DataValue>>;
}

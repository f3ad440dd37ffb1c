//! Watermark and sync state model types.
//!
//! [`SyncState`] is the whole persisted progress of a run: one
//! [`Watermark`] per stream plus the currently-syncing marker. Its JSON
//! form is the `STATE` payload (`{"bookmarks": {...}, "currently_syncing": ...}`).

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::datetime::{format_watermark, parse_naive_datetime};
use crate::stream::StreamName;

/// Last confirmed-processed replication value of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(NaiveDateTime);

impl Watermark {
    #[must_use]
    pub fn new(value: NaiveDateTime) -> Self {
        Self(value)
    }

    /// Watermark at midnight of `date`.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.and_time(NaiveTime::MIN))
    }

    /// Parse any supported date spelling.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        parse_naive_datetime(input).map(Self)
    }

    #[must_use]
    pub fn value(&self) -> NaiveDateTime {
        self.0
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_watermark(self.0))
    }
}

impl Serialize for Watermark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_watermark(self.0))
    }
}

impl<'de> Deserialize<'de> for Watermark {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid watermark '{raw}'")))
    }
}

/// Per-run progress: watermark map plus the currently-syncing marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub bookmarks: BTreeMap<StreamName, Watermark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currently_syncing: Option<StreamName>,
}

impl SyncState {
    #[must_use]
    pub fn watermark(&self, stream: &StreamName) -> Option<Watermark> {
        self.bookmarks.get(stream).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermark_serializes_with_zulu_suffix() {
        let wm = Watermark::from_date(NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());
        assert_eq!(serde_json::to_string(&wm).unwrap(), "\"2023-01-03T00:00:00Z\"");
    }

    #[test]
    fn watermark_accepts_date_only_input() {
        let wm: Watermark = serde_json::from_str("\"2023-01-03\"").unwrap();
        assert_eq!(wm.date(), NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());
        assert!(serde_json::from_str::<Watermark>("\"soon\"").is_err());
    }

    #[test]
    fn sync_state_json_shape() {
        let mut state = SyncState::default();
        state.bookmarks.insert(
            StreamName::new("assets"),
            Watermark::parse("2023-02-01T00:00:00Z").unwrap(),
        );
        state.currently_syncing = Some(StreamName::new("funds"));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "bookmarks": {"assets": "2023-02-01T00:00:00Z"},
                "currently_syncing": "funds"
            })
        );
    }

    #[test]
    fn sync_state_tolerates_missing_sections() {
        let state: SyncState = serde_json::from_str("{}").unwrap();
        assert!(state.bookmarks.is_empty());
        assert!(state.currently_syncing.is_none());
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("currently_syncing").is_none());
    }

    #[test]
    fn watermarks_order_chronologically() {
        let a = Watermark::parse("2023-01-01").unwrap();
        let b = Watermark::parse("2023-01-01T00:00:01").unwrap();
        assert!(a < b);
    }
}

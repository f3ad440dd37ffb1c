//! Stream descriptors and retrieval strategy selection.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque stream name (e.g. `"assets"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamName(String);

impl StreamName {
    /// Create a new stream name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for StreamName {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

/// Remote object type addressed by transport calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Asset,
    CurrencyRate,
    DataItem,
    Fund,
    Investment,
    InvestmentTransaction,
    ObjectRelationship,
    Scenario,
    Security,
    SegmentNode,
}

impl EntityKind {
    /// Wire-format string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::CurrencyRate => "currency_rate",
            Self::DataItem => "data_item",
            Self::Fund => "fund",
            Self::Investment => "investment",
            Self::InvestmentTransaction => "investment_transaction",
            Self::ObjectRelationship => "object_relationship",
            Self::Scenario => "scenario",
            Self::Security => "security",
            Self::SegmentNode => "segment_node",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Watermark kind and strategy
// ---------------------------------------------------------------------------

/// How a stream tracks its progress between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkKind {
    /// Re-read everything each run; no watermark.
    FullTable,
    /// Datetime watermark advanced per completed window.
    IncrementalDatetime,
    /// Datetime watermark advanced per completed day.
    ExactDateMatch,
    /// Datetime watermark advanced per completed window of the two-stage pipeline.
    Periodic,
}

impl WatermarkKind {
    /// Whether runs start from the persisted watermark instead of the configured start date.
    #[must_use]
    pub fn resumes_from_watermark(self) -> bool {
        !matches!(self, Self::FullTable)
    }
}

/// Retrieval strategy for one stream, selected once from its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    FullSnapshot,
    IncrementalByChangedIds,
    ExactDateMatch,
    TwoStagePeriodic,
}

impl RetrievalStrategy {
    /// Wire-format string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullSnapshot => "full_snapshot",
            Self::IncrementalByChangedIds => "incremental_by_changed_ids",
            Self::ExactDateMatch => "exact_date_match",
            Self::TwoStagePeriodic => "two_stage_periodic",
        }
    }
}

impl std::fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one extractable stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: StreamName,
    pub strategy: RetrievalStrategy,
    /// Remote object type the strategy queries (base entity for periodic streams).
    pub entity: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,
    pub watermark: WatermarkKind,
}

impl StreamDescriptor {
    /// Primary key columns declared with the stream schema.
    #[must_use]
    pub fn key_properties(&self) -> Vec<String> {
        vec!["id".to_string()]
    }
}

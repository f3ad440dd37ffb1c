//! Built-in stream catalog.
//!
//! Streams are listed in the order a run processes them.

use crate::stream::{EntityKind, RetrievalStrategy, StreamDescriptor, StreamName, WatermarkKind};

/// Replication key carried by records of incrementally-synced entity streams.
pub const LAST_MODIFIED_KEY: &str = "last_modified_date";

fn incremental(name: &str, entity: EntityKind) -> StreamDescriptor {
    StreamDescriptor {
        name: StreamName::new(name),
        strategy: RetrievalStrategy::IncrementalByChangedIds,
        entity,
        replication_key: Some(LAST_MODIFIED_KEY.to_string()),
        watermark: WatermarkKind::IncrementalDatetime,
    }
}

fn snapshot(name: &str, entity: EntityKind) -> StreamDescriptor {
    StreamDescriptor {
        name: StreamName::new(name),
        strategy: RetrievalStrategy::FullSnapshot,
        entity,
        replication_key: None,
        watermark: WatermarkKind::FullTable,
    }
}

fn periodic(name: &str, entity: EntityKind) -> StreamDescriptor {
    StreamDescriptor {
        name: StreamName::new(name),
        strategy: RetrievalStrategy::TwoStagePeriodic,
        entity,
        replication_key: None,
        watermark: WatermarkKind::Periodic,
    }
}

/// All streams this extractor knows how to sync, in processing order.
#[must_use]
pub fn builtin_streams() -> Vec<StreamDescriptor> {
    vec![
        incremental("assets", EntityKind::Asset),
        incremental("funds", EntityKind::Fund),
        incremental("investments", EntityKind::Investment),
        incremental("securities", EntityKind::Security),
        incremental("currency_rates", EntityKind::CurrencyRate),
        incremental("segments", EntityKind::SegmentNode),
        snapshot("data_items", EntityKind::DataItem),
        snapshot("scenarios", EntityKind::Scenario),
        snapshot("object_relations", EntityKind::ObjectRelationship),
        StreamDescriptor {
            name: StreamName::new("investment_transactions"),
            strategy: RetrievalStrategy::ExactDateMatch,
            entity: EntityKind::InvestmentTransaction,
            replication_key: None,
            watermark: WatermarkKind::ExactDateMatch,
        },
        periodic("asset_periodic_data", EntityKind::Asset),
        periodic("fund_periodic_data", EntityKind::Fund),
    ]
}

/// Look up a built-in stream by name.
#[must_use]
pub fn find_stream(name: &str) -> Option<StreamDescriptor> {
    builtin_streams().into_iter().find(|s| s.name.as_str() == name)
}

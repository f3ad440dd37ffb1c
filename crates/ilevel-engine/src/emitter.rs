//! Downstream sink boundary and a Singer-style JSON-lines implementation.

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use ilevel_types::record::NormalizedRecord;
use ilevel_types::state::SyncState;
use ilevel_types::stream::{StreamDescriptor, StreamName};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("failed to write message: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Receives schema declarations, records, and state checkpoints.
pub trait Emitter {
    /// Called once per stream before its first record.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError`] if the sink cannot accept the message.
    fn declare_schema(&mut self, stream: &StreamDescriptor) -> Result<(), EmitError>;

    /// # Errors
    ///
    /// Returns [`EmitError`] if the sink cannot accept the record.
    fn emit(
        &mut self,
        stream: &StreamName,
        record: &NormalizedRecord,
        extracted_at: DateTime<Utc>,
    ) -> Result<(), EmitError>;

    /// Forward a full state snapshot downstream.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError`] if the sink cannot accept the snapshot.
    fn persist_state(&mut self, state: &SyncState) -> Result<(), EmitError>;
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
enum Message<'a> {
    Schema {
        stream: &'a str,
        schema: serde_json::Value,
        key_properties: Vec<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        bookmark_properties: Vec<&'a str>,
    },
    Record {
        stream: &'a str,
        record: &'a NormalizedRecord,
        time_extracted: String,
    },
    State {
        value: &'a SyncState,
    },
}

/// Writes one JSON message per line to `W`.
pub struct JsonLinesEmitter<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, message: &Message<'_>) -> Result<(), EmitError> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> Emitter for JsonLinesEmitter<W> {
    fn declare_schema(&mut self, stream: &StreamDescriptor) -> Result<(), EmitError> {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {},
            "additionalProperties": true,
        });
        self.write(&Message::Schema {
            stream: stream.name.as_str(),
            schema,
            key_properties: stream.key_properties(),
            bookmark_properties: stream.replication_key.as_deref().into_iter().collect(),
        })
    }

    fn emit(
        &mut self,
        stream: &StreamName,
        record: &NormalizedRecord,
        extracted_at: DateTime<Utc>,
    ) -> Result<(), EmitError> {
        self.write(&Message::Record {
            stream: stream.as_str(),
            record,
            time_extracted: extracted_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        })?;
        Ok(())
    }

    fn persist_state(&mut self, state: &SyncState) -> Result<(), EmitError> {
        self.write(&Message::State { value: state })?;
        self.out.flush()?;
        Ok(())
    }
}

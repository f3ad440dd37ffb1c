//! Extraction engine for span- and batch-limited query APIs.
//!
//! Splits a run's time range into API-legal windows, batches id sets,
//! drives one of four retrieval strategies per stream, normalizes and
//! filters records against persisted watermarks, and checkpoints after
//! every completed unit of work.

pub mod batcher;
pub mod bookmark;
pub mod config;
pub mod dispatcher;
pub mod emitter;
pub mod errors;
pub mod normalize;
pub mod orchestrator;
pub mod periodic;
pub mod planner;
pub mod resolve;
pub mod result;
pub mod transport;

pub use errors::SyncError;
pub use orchestrator::{plan_streams, prepare, run_sync, run_sync_at, StreamPlan};
pub use result::{StreamResult, StreamTally, SyncResult};

//! Shared model types for the iLevel extractor.
//!
//! Pure data: stream descriptors, windows and id batches, raw and
//! normalized records, watermark state, and the extraction error taxonomy.
//! Kept dependency-light so the state and engine crates can share them.

#![warn(clippy::pedantic)]

pub mod catalog;
pub mod datetime;
pub mod error;
pub mod record;
pub mod state;
pub mod stream;
pub mod window;

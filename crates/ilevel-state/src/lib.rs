//! Sync state persistence for the iLevel extractor.
//!
//! Provides the [`StateBackend`] trait and three implementations: a
//! [`SqliteStateBackend`], a [`JsonFileStateBackend`] writing a Singer-style
//! state document, and an in-process [`MemoryStateBackend`].

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod json_file;
pub mod memory;
pub mod sqlite;

pub use backend::StateBackend;
pub use error::StateError;
pub use json_file::JsonFileStateBackend;
pub use memory::MemoryStateBackend;
pub use sqlite::SqliteStateBackend;

//! Pipeline state persistence for the fluxline engine.
//!
//! Provides the storage contracts the batch runner drives ([`OffsetTracker`],
//! [`SnapshotStore`], and [`ErrorRecordStore`]) plus a SQLite implementation
//! of all three.
//!
//! [`OffsetTracker`]: backend::OffsetTracker
//! [`SnapshotStore`]: backend::SnapshotStore
//! [`ErrorRecordStore`]: backend::ErrorRecordStore

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod sqlite;

pub use backend::{ErrorRecordStore, OffsetTracker, SnapshotStore};
pub use error::StateError;
pub use sqlite::{SqliteOffsetTracker, SqliteStateStore};

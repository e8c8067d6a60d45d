//! Pollwatch Core - snapshot model and diff engine for the polling watcher
//!
//! This crate provides the data layer shared by the watcher and its front-ends:
//! - Per-path metadata captured during a listing pass
//! - Snapshots (path -> metadata) of everything being watched
//! - Change events and their operation kinds
//! - Snapshot diffing with rename/move inference
//! - Path normalization

pub mod diff;
pub mod event;
pub mod metadata;
pub mod path;
pub mod snapshot;

// Re-export main types for convenience
pub use diff::{diff, SnapshotDiff};
pub use event::{Event, Labelled, Op, ParseOpError};
pub use metadata::Metadata;
pub use path::{is_hidden, normalize_path};
pub use snapshot::Snapshot;

//! Change events emitted by the watcher

use crate::metadata::Metadata;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Path marker used for synthetic events
pub const TRIGGERED_PATH: &str = "-";

/// Separator between old and new path in rename/move events
pub const RELOCATION_SEPARATOR: &str = " -> ";

/// Kind of change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// Path appeared
    Create,
    /// Modification time changed
    Write,
    /// Path disappeared
    Remove,
    /// Same file reappeared under a new name in the same directory
    Rename,
    /// Permission bits changed
    Chmod,
    /// Same file reappeared in a different directory
    Move,
}

impl Op {
    /// Every operation kind
    pub const ALL: [Op; 6] = [
        Op::Create,
        Op::Write,
        Op::Remove,
        Op::Rename,
        Op::Chmod,
        Op::Move,
    ];

    /// Upper-case label, e.g. `CREATE`
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Create => "CREATE",
            Op::Write => "WRITE",
            Op::Remove => "REMOVE",
            Op::Rename => "RENAME",
            Op::Chmod => "CHMOD",
            Op::Move => "MOVE",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown operation name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation '{0}' (expected one of create, write, remove, rename, chmod, move)")]
pub struct ParseOpError(pub String);

impl FromStr for Op {
    type Err = ParseOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Op::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseOpError(s.to_string()))
    }
}

/// A single change observed between two snapshots (or injected by a caller)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Kind of change
    pub op: Op,
    /// Affected path; `"<old> -> <new>"` for renames and moves, `"-"` for triggered events
    pub path: String,
    /// Previous location for renames and moves
    pub old_path: Option<PathBuf>,
    /// Metadata of the triggering file (the old entry for renames and moves)
    pub meta: Metadata,
}

impl Event {
    /// Create an event for a single path
    pub fn new(op: Op, path: &Path, meta: Metadata) -> Self {
        Self {
            op,
            path: path.to_string_lossy().into_owned(),
            old_path: None,
            meta,
        }
    }

    /// Create a rename or move event for a file that went from `from` to `to`
    ///
    /// Same parent directory means rename, anything else is a move.
    pub fn relocated(from: &Path, to: &Path, meta: Metadata) -> Self {
        let op = if from.parent() == to.parent() {
            Op::Rename
        } else {
            Op::Move
        };

        Self {
            op,
            path: format!(
                "{}{}{}",
                from.to_string_lossy(),
                RELOCATION_SEPARATOR,
                to.to_string_lossy()
            ),
            old_path: Some(from.to_path_buf()),
            meta,
        }
    }

    /// Create a synthetic event not backed by a filesystem change
    pub fn triggered(op: Op, meta: Option<Metadata>) -> Self {
        Self {
            op,
            path: TRIGGERED_PATH.to_string(),
            old_path: None,
            meta: meta.unwrap_or_else(Metadata::triggered),
        }
    }

    /// Display the event with `op` in place of the operation label
    pub fn display_with<D: fmt::Display>(&self, op: D) -> Labelled<'_, D> {
        Labelled { event: self, op }
    }
}

/// An event rendered with a caller-supplied operation label
pub struct Labelled<'a, D> {
    event: &'a Event,
    op: D,
}

impl<D: fmt::Display> fmt::Display for Labelled<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = &self.event.meta;
        let kind = if meta.is_dir { "DIRECTORY" } else { "FILE" };
        write!(f, "{} {:?} {} [{}]", kind, meta.name, self.op, self.event.path)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.display_with(self.op).fmt(f)
    }
}

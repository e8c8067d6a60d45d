//! Snapshot diffing
//!
//! Compares two generations of watched state and turns the differences into
//! events. A removal and a creation whose metadata describe the same file are
//! folded into a single rename (same directory) or move (different directory).

use crate::event::{Event, Op};
use crate::metadata::Metadata;
use crate::snapshot::Snapshot;
use ahash::AHashSet;
use std::path::Path;

/// Differences between two snapshots, grouped by delivery stage
///
/// Every group is in ascending path order (of the new path for creates and
/// of the old path for removes, renames and moves).
#[derive(Debug, Clone, Default)]
pub struct SnapshotDiff {
    /// Write and Chmod events for paths present in both snapshots
    pub modified: Vec<Event>,
    /// Rename and Move events
    pub relocated: Vec<Event>,
    /// Create events left after rename/move pairing
    pub created: Vec<Event>,
    /// Remove events left after rename/move pairing
    pub removed: Vec<Event>,
}

impl SnapshotDiff {
    /// Compute the diff between two snapshots
    pub fn compute(old: &Snapshot, new: &Snapshot) -> Self {
        let mut diff = Self::default();

        let removes: Vec<(&Path, &Metadata)> = old
            .iter()
            .filter(|(path, _)| !new.contains(path))
            .map(|(path, meta)| (path.as_path(), meta))
            .collect();

        let mut creates: Vec<(&Path, &Metadata)> = Vec::new();
        for (path, meta) in new {
            let prev = match old.get(path) {
                Some(prev) => prev,
                None => {
                    creates.push((path.as_path(), meta));
                    continue;
                }
            };

            if prev.modified != meta.modified {
                diff.modified.push(Event::new(Op::Write, path, meta.clone()));
            }
            if prev.mode != meta.mode {
                diff.modified.push(Event::new(Op::Chmod, path, meta.clone()));
            }
        }

        // Pairwise matching is O(removes * creates); change sets per cycle are small
        let mut consumed: AHashSet<usize> = AHashSet::new();
        'removes: for (old_path, old_meta) in removes {
            for (idx, (new_path, new_meta)) in creates.iter().enumerate() {
                if consumed.contains(&idx) || !old_meta.same_file(new_meta) {
                    continue;
                }
                consumed.insert(idx);
                diff.relocated
                    .push(Event::relocated(old_path, new_path, old_meta.clone()));
                continue 'removes;
            }
            diff.removed
                .push(Event::new(Op::Remove, old_path, old_meta.clone()));
        }

        diff.created = creates
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| !consumed.contains(idx))
            .map(|(_, (path, meta))| Event::new(Op::Create, path, meta.clone()))
            .collect();

        diff
    }

    /// Check if there are any changes
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty()
            && self.relocated.is_empty()
            && self.created.is_empty()
            && self.removed.is_empty()
    }

    /// Total number of events
    pub fn len(&self) -> usize {
        self.modified.len() + self.relocated.len() + self.created.len() + self.removed.len()
    }

    /// Flatten into delivery order: writes/chmods, renames/moves, creates, removes
    pub fn into_events(self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.len());
        events.extend(self.modified);
        events.extend(self.relocated);
        events.extend(self.created);
        events.extend(self.removed);
        events
    }
}

/// Diff two snapshots into an ordered list of events
pub fn diff(old: &Snapshot, new: &Snapshot) -> Vec<Event> {
    SnapshotDiff::compute(old, new).into_events()
}

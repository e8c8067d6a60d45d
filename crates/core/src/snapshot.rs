//! Snapshot representation for watched paths

use crate::metadata::Metadata;
use std::collections::btree_map::{self, BTreeMap};
use std::path::{Path, PathBuf};

/// Point-in-time mapping from absolute path to observed metadata
///
/// Keys are kept in a `BTreeMap`, so iteration is in ascending path order.
/// Paths are compared component-wise, which keeps every descendant of a
/// directory contiguous right after the directory itself.
///
/// On case-insensitive filesystems two keys may name the same physical file;
/// no attempt is made to fold them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<PathBuf, Metadata>,
}

impl Snapshot {
    /// Create a new empty snapshot
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert an entry, returning the previous metadata for the path
    pub fn insert(&mut self, path: PathBuf, meta: Metadata) -> Option<Metadata> {
        self.entries.insert(path, meta)
    }

    /// Get an entry
    pub fn get(&self, path: &Path) -> Option<&Metadata> {
        self.entries.get(path)
    }

    /// Check whether a path is tracked
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Remove a single entry
    pub fn remove(&mut self, path: &Path) -> Option<Metadata> {
        self.entries.remove(path)
    }

    /// Remove `path` and, if it was a directory, its immediate children
    ///
    /// Nested descendants are left in place. Returns the number of entries removed.
    pub fn remove_with_children(&mut self, path: &Path) -> usize {
        let meta = match self.entries.remove(path) {
            Some(meta) => meta,
            None => return 0,
        };
        if !meta.is_dir {
            return 1;
        }

        let children: Vec<PathBuf> = self
            .under(path)
            .filter(|p| p.parent() == Some(path))
            .cloned()
            .collect();
        for child in &children {
            self.entries.remove(child);
        }
        1 + children.len()
    }

    /// Remove `root` and every entry beneath it
    ///
    /// Returns the number of entries removed.
    pub fn remove_tree(&mut self, root: &Path) -> usize {
        let doomed: Vec<PathBuf> = self.under(root).cloned().collect();
        let mut removed = doomed.len();
        for path in &doomed {
            self.entries.remove(path);
        }
        if self.entries.remove(root).is_some() {
            removed += 1;
        }
        removed
    }

    /// Keep only the entries for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&Path, &Metadata) -> bool) {
        self.entries.retain(|path, meta| keep(path, meta));
    }

    /// Merge another snapshot into this one, overwriting duplicates
    pub fn merge(&mut self, other: Snapshot) {
        self.entries.extend(other.entries);
    }

    /// Iterate entries in ascending path order
    pub fn iter(&self) -> btree_map::Iter<'_, PathBuf, Metadata> {
        self.entries.iter()
    }

    /// Iterate paths in ascending order
    pub fn paths(&self) -> btree_map::Keys<'_, PathBuf, Metadata> {
        self.entries.keys()
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Strict descendants of `root`, in path order
    fn under<'a>(&'a self, root: &'a Path) -> impl Iterator<Item = &'a PathBuf> + 'a {
        use std::ops::Bound::{Excluded, Unbounded};

        self.entries
            .range::<Path, _>((Excluded(root), Unbounded))
            .map(|(path, _)| path)
            .take_while(move |path| path.starts_with(root))
    }
}

impl FromIterator<(PathBuf, Metadata)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (PathBuf, Metadata)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<(PathBuf, Metadata)> for Snapshot {
    fn extend<I: IntoIterator<Item = (PathBuf, Metadata)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for Snapshot {
    type Item = (PathBuf, Metadata);
    type IntoIter = btree_map::IntoIter<PathBuf, Metadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a PathBuf, &'a Metadata);
    type IntoIter = btree_map::Iter<'a, PathBuf, Metadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

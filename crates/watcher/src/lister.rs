//! Snapshot gathering for a single watch root
//!
//! Non-recursive roots are listed one level deep; recursive roots are walked
//! depth-first with `walkdir`, pruning ignored directories before descending.
//!
//! The root itself is never filtered here; callers decide whether a root is
//! watched at all. Only failures on the root path are reported. Entries below
//! the root that vanish or cannot be read while the listing is in progress are
//! skipped and the walk continues.

use crate::error::ListError;
use crate::ignore::IgnoreRules;
use pollwatch_core::{Metadata, Snapshot};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Lists watch roots according to a set of ignore rules
pub struct PathLister<'a> {
    rules: &'a IgnoreRules,
}

impl<'a> PathLister<'a> {
    /// Create a lister that applies `rules`
    pub fn new(rules: &'a IgnoreRules) -> Self {
        Self { rules }
    }

    /// List `path`, descending fully when `recursive` is set
    pub fn list(&self, path: &Path, recursive: bool) -> Result<Snapshot, ListError> {
        if recursive {
            self.list_tree(path)
        } else {
            self.list_flat(path)
        }
    }

    /// The path itself plus, for directories, its immediate children
    fn list_flat(&self, path: &Path) -> Result<Snapshot, ListError> {
        let root = Metadata::stat(path).map_err(|e| ListError::from_io(path, e))?;
        let is_dir = root.is_dir;

        let mut snapshot = Snapshot::new();
        snapshot.insert(path.to_path_buf(), root);
        if !is_dir {
            return Ok(snapshot);
        }

        let entries = fs::read_dir(path).map_err(|e| ListError::from_io(path, e))?;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry in {}: {}", path.display(), e);
                    continue;
                }
            };

            let child = entry.path();
            // DirEntry::metadata does not follow symlinks
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(e) => {
                    debug!("Skipping {}: {}", child.display(), e);
                    continue;
                }
            };

            if self.rules.should_skip(&child, meta.is_dir()) {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            snapshot.insert(child, Metadata::from_fs(name, &meta));
        }

        Ok(snapshot)
    }

    /// Every entry beneath `path`, skipping ignored subtrees
    fn list_tree(&self, path: &Path) -> Result<Snapshot, ListError> {
        let mut snapshot = Snapshot::new();

        let walker = WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !self.rules.should_skip(e.path(), e.file_type().is_dir())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    let message = err.to_string();
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, message));
                    return Err(ListError::from_io(path, source));
                }
                Err(err) => {
                    debug!("Skipping entry under {}: {}", path.display(), err);
                    continue;
                }
            };

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(err) => {
                    debug!("Skipping {}: {}", entry.path().display(), err);
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();
            snapshot.insert(entry.into_path(), Metadata::from_fs(name, &meta));
        }

        Ok(snapshot)
    }
}

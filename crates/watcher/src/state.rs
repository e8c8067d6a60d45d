//! Shared watcher state
//!
//! Everything the poll loop and the configuration calls both touch lives in
//! [`WatchState`], behind the single mutex owned by the `Watcher`. The loop
//! holds that lock while it lists roots and again while it commits, never
//! while it is blocked handing events to a consumer.

use crate::dispatch::DispatchPolicy;
use crate::error::WatchError;
use crate::ignore::IgnoreRules;
use crate::lister::PathLister;
use pollwatch_core::{is_hidden, Metadata, Op, Snapshot};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether a root registered with `recursive` tracks `path`
pub(crate) fn covers(root: &Path, recursive: bool, path: &Path) -> bool {
    if recursive {
        path.starts_with(root)
    } else {
        path == root || path.parent() == Some(root)
    }
}

/// Everything one poll cycle needs after the lock is released
pub(crate) struct CyclePlan {
    /// Snapshot committed by the previous cycle
    pub(crate) previous: Arc<Snapshot>,
    /// Freshly listed snapshot
    pub(crate) current: Snapshot,
    /// Listing failures to report before any event
    pub(crate) failures: Vec<WatchError>,
    /// Dispatch settings in effect for this cycle
    pub(crate) policy: DispatchPolicy,
    /// Roots as they were listed
    pub(crate) roots: BTreeMap<PathBuf, bool>,
    /// Configuration generation the listing was taken at
    pub(crate) generation: u64,
}

/// Snapshot, root registry, ignore rules and dispatch policy
#[derive(Debug, Default)]
pub(crate) struct WatchState {
    running: bool,
    closed: bool,

    /// Last committed snapshot; shared with an in-flight cycle
    files: Arc<Snapshot>,

    /// Watch roots and their recursive flag
    roots: BTreeMap<PathBuf, bool>,

    rules: IgnoreRules,
    policy: DispatchPolicy,

    /// Bumped by every call that changes roots or ignore rules
    generation: u64,
}

impl WatchState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Move from idle to running
    pub(crate) fn mark_running(&mut self) -> Result<(), WatchError> {
        if self.closed {
            return Err(WatchError::Closed);
        }
        if self.running {
            return Err(WatchError::AlreadyRunning);
        }
        self.running = true;
        Ok(())
    }

    /// Stop and drop all tracked state; the state stays closed afterwards
    pub(crate) fn shutdown(&mut self) {
        self.running = false;
        self.closed = true;
        self.files = Arc::new(Snapshot::new());
        self.roots.clear();
        self.generation += 1;
    }

    /// Register `path` and merge its current listing
    ///
    /// Ignored paths, and hidden ones while suppression is on, are silently
    /// skipped. Re-adding a root overwrites its recursive flag.
    pub(crate) fn add_root(&mut self, path: PathBuf, recursive: bool) -> Result<(), WatchError> {
        if self.rules.ignored_paths().any(|ignored| path.starts_with(ignored)) {
            debug!("Not watching ignored path {}", path.display());
            return Ok(());
        }
        if self.rules.ignore_hidden() && is_hidden(&path) {
            debug!("Not watching hidden path {}", path.display());
            return Ok(());
        }

        let listing = PathLister::new(&self.rules).list(&path, recursive)?;
        debug!(
            "Watching {} ({} entries, recursive: {})",
            path.display(),
            listing.len(),
            recursive
        );

        Arc::make_mut(&mut self.files).merge(listing);
        self.roots.insert(path, recursive);
        self.generation += 1;
        Ok(())
    }

    /// Stop watching `path`; drops it and, for a directory, its immediate children
    pub(crate) fn remove_root(&mut self, path: &Path) {
        self.roots.remove(path);
        Arc::make_mut(&mut self.files).remove_with_children(path);
        self.generation += 1;
    }

    /// Stop watching `path` and everything tracked beneath it, nested roots included
    pub(crate) fn remove_root_recursive(&mut self, path: &Path) {
        self.roots.retain(|root, _| !root.starts_with(path));
        Arc::make_mut(&mut self.files).remove_tree(path);
        self.generation += 1;
    }

    /// Purge `paths` recursively and exclude them from every later listing
    pub(crate) fn ignore(&mut self, paths: Vec<PathBuf>) {
        for path in paths {
            self.remove_root_recursive(&path);
            self.rules.insert_path(path);
        }
    }

    /// Replace the gitignore-style patterns and purge entries they now exclude
    pub(crate) fn set_ignore_patterns(&mut self, lines: &[String]) -> Result<(), WatchError> {
        self.rules.set_patterns(lines)?;
        self.prune();
        self.generation += 1;
        Ok(())
    }

    /// Toggle hidden-file suppression
    pub(crate) fn set_ignore_hidden(&mut self, ignore: bool) {
        self.rules.set_ignore_hidden(ignore);
        if ignore {
            self.prune();
        }
        self.generation += 1;
    }

    pub(crate) fn set_max_events(&mut self, max: usize) {
        self.policy.set_max_events(max);
    }

    pub(crate) fn filter_ops(&mut self, ops: impl IntoIterator<Item = Op>) {
        self.policy.set_ops(ops);
    }

    pub(crate) fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub(crate) fn rules(&self) -> &IgnoreRules {
        &self.rules
    }

    /// Copy of the committed snapshot
    pub(crate) fn watched_files(&self) -> Snapshot {
        Snapshot::clone(&self.files)
    }

    /// Registered roots and their recursive flag
    pub(crate) fn roots(&self) -> &BTreeMap<PathBuf, bool> {
        &self.roots
    }

    /// List every root and capture what the cycle needs
    ///
    /// Vanished roots are deregistered before the previous snapshot is
    /// captured, so their entries produce no Remove events. Roots that fail
    /// for any other reason stay registered and keep their previous entries
    /// for this cycle.
    pub(crate) fn begin_cycle(&mut self) -> CyclePlan {
        let mut current = Snapshot::new();
        let mut failures = Vec::new();
        let mut vanished = Vec::new();

        let lister = PathLister::new(&self.rules);
        for (root, &recursive) in &self.roots {
            match lister.list(root, recursive) {
                Ok(listing) => current.merge(listing),
                Err(err) if err.is_not_found() => {
                    warn!("Watched path vanished: {}", root.display());
                    vanished.push((root.clone(), recursive));
                }
                Err(err) => {
                    warn!("Failed to list {}: {}", root.display(), err);
                    for (path, meta) in self.files.iter() {
                        if covers(root, recursive, path) && !current.contains(path) {
                            current.insert(path.clone(), meta.clone());
                        }
                    }
                    failures.push(err.into());
                }
            }
        }

        for (root, recursive) in vanished {
            if recursive {
                self.remove_root_recursive(&root);
            } else {
                self.remove_root(&root);
            }
            failures.push(WatchError::WatchedPathDeleted(root));
        }

        CyclePlan {
            previous: Arc::clone(&self.files),
            current,
            failures,
            policy: self.policy.clone(),
            roots: self.roots.clone(),
            generation: self.generation,
        }
    }

    /// Replace the committed snapshot with a cycle's listing
    ///
    /// When configuration changed since `generation`, entries no longer
    /// covered or now excluded are dropped and roots registered mid-cycle keep
    /// the entries their `add` merged. Returns false, committing nothing, once
    /// the watcher has stopped running.
    pub(crate) fn commit(
        &mut self,
        mut snapshot: Snapshot,
        cycle_roots: &BTreeMap<PathBuf, bool>,
        generation: u64,
    ) -> bool {
        if !self.running {
            return false;
        }

        if self.generation != generation {
            snapshot.retain(|path, meta| self.tracks(path, meta));

            for (root, &recursive) in &self.roots {
                if cycle_roots.get(root) == Some(&recursive) {
                    continue;
                }
                for (path, meta) in self.files.iter() {
                    if covers(root, recursive, path) && !snapshot.contains(path) {
                        snapshot.insert(path.clone(), meta.clone());
                    }
                }
            }
            debug!("Reconciled snapshot with configuration changed mid-cycle");
        }

        self.files = Arc::new(snapshot);
        true
    }

    /// Drop committed entries the current roots and rules no longer track
    fn prune(&mut self) {
        let kept: Snapshot = self
            .files
            .iter()
            .filter(|(path, meta)| self.tracks(path, meta))
            .map(|(path, meta)| (path.clone(), meta.clone()))
            .collect();
        self.files = Arc::new(kept);
    }

    /// Whether some root covers `path` without the rules excluding it
    fn tracks(&self, path: &Path, meta: &Metadata) -> bool {
        self.roots.iter().any(|(root, &recursive)| {
            covers(root, recursive, path)
                && (path == root.as_path() || !self.rules.excludes(root, path, meta.is_dir))
        })
    }
}

//! Ignore rule management for the watcher
//!
//! Three sources decide whether a path is left out of listings:
//! 1. Explicitly ignored paths (exact match, and everything beneath them)
//! 2. Hidden files, when suppression is enabled
//! 3. Gitignore-style patterns (optional)

use ahash::AHashSet;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use pollwatch_core::is_hidden;
use std::path::{Path, PathBuf};

/// Ignore rule set consulted by the lister
#[derive(Debug, Default)]
pub struct IgnoreRules {
    /// Absolute paths excluded from listing and diffing
    paths: AHashSet<PathBuf>,

    /// Compiled glob patterns (optional)
    patterns: Option<Gitignore>,

    /// Skip entries whose name starts with '.'
    ignore_hidden: bool,
}

impl IgnoreRules {
    /// Create an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an absolute path to the ignore set
    pub fn insert_path(&mut self, path: PathBuf) {
        self.paths.insert(path);
    }

    /// Explicitly ignored paths
    pub fn ignored_paths(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }

    /// Enable or disable hidden-file suppression
    pub fn set_ignore_hidden(&mut self, ignore: bool) {
        self.ignore_hidden = ignore;
    }

    /// Whether hidden files are suppressed
    pub fn ignore_hidden(&self) -> bool {
        self.ignore_hidden
    }

    /// Replace the glob patterns
    ///
    /// Patterns use gitignore syntax and are matched against absolute paths.
    /// An empty list clears them.
    pub fn set_patterns(&mut self, lines: &[String]) -> Result<(), ignore::Error> {
        if lines.is_empty() {
            self.patterns = None;
            return Ok(());
        }

        let mut builder = GitignoreBuilder::new(Path::new("/"));
        for line in lines {
            builder.add_line(None, line)?;
        }
        self.patterns = Some(builder.build()?);
        Ok(())
    }

    /// Check if a listed entry should be skipped
    ///
    /// Only the entry itself is tested; the lister is responsible for not
    /// descending into skipped directories.
    pub fn should_skip(&self, path: &Path, is_dir: bool) -> bool {
        if self.paths.contains(path) {
            return true;
        }

        if self.ignore_hidden && is_hidden(path) {
            return true;
        }

        match self.patterns {
            Some(ref patterns) => patterns.matched(path, is_dir).is_ignore(),
            None => false,
        }
    }

    /// Check if `path`, or any of its ancestors below `root`, is excluded
    ///
    /// Used when pruning already tracked entries, where the walk that would
    /// have skipped a parent directory never happened. The root and its
    /// ancestors are not consulted, matching what the lister sees.
    pub fn excludes(&self, root: &Path, path: &Path, is_dir: bool) -> bool {
        if self.paths.iter().any(|ignored| path.starts_with(ignored)) {
            return true;
        }
        if self.should_skip(path, is_dir) {
            return true;
        }
        path.ancestors()
            .skip(1)
            .take_while(|parent| *parent != root && parent.starts_with(root))
            .any(|parent| self.should_skip(parent, true))
    }
}

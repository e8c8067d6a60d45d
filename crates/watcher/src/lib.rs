//! Polling file system watcher
//!
//! This crate watches files and directories by periodically listing them and
//! diffing each listing against the previous one:
//! - Recursive and single-level watch roots
//! - Rename and move detection from metadata
//! - Ignored paths, hidden-file suppression and gitignore-style patterns
//! - Operation filtering and a per-cycle event cap
//!
//! Events and errors are handed over on zero-capacity channels, so the poll
//! loop only advances as fast as consumers receive. A consumer that stops
//! draining the error channel stalls the watcher.

pub mod config;
mod dispatch;
pub mod error;
pub mod ignore;
pub mod lister;
mod poll;
mod signal;
mod state;

pub use config::WatcherConfig;
pub use dispatch::DispatchPolicy;
pub use error::{ListError, WatchError};
pub use lister::PathLister;
pub use pollwatch_core::{diff, Event, Metadata, Op, Snapshot, SnapshotDiff};

use crate::dispatch::{send_or_cancel, Outlet};
use crate::poll::PollLoop;
use crate::signal::Latch;
use crate::state::WatchState;
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use pollwatch_core::normalize_path;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest polling interval `start` accepts
pub const MIN_INTERVAL: Duration = Duration::from_nanos(1);

/// Polling watcher
///
/// All methods take `&self`; share a watcher between threads with `Arc`.
/// `start` blocks the calling thread for as long as the watcher runs.
pub struct Watcher {
    state: Mutex<WatchState>,

    /// Sending halves, dropped once the loop has stopped
    outlet: Mutex<Option<Outlet>>,
    events: Receiver<Event>,
    errors: Receiver<WatchError>,

    /// Fires when the loop starts
    ready: Latch,
    /// Fires when `close` is called on a running watcher
    cancel: Latch,
    /// Fires when the loop has stopped
    closed: Latch,
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Watcher {
    /// Create an idle watcher with nothing to watch
    pub fn new() -> Self {
        let (events_tx, events) = bounded(0);
        let (errors_tx, errors) = bounded(0);

        Self {
            state: Mutex::new(WatchState::new()),
            outlet: Mutex::new(Some(Outlet {
                events: events_tx,
                errors: errors_tx,
            })),
            events,
            errors,
            ready: Latch::new(),
            cancel: Latch::new(),
            closed: Latch::new(),
        }
    }

    /// Create a watcher with filters and ignore rules from `config`
    ///
    /// The interval is not applied here; pass `config.interval()` to `start`.
    pub fn with_config(config: &WatcherConfig) -> Result<Self, WatchError> {
        let watcher = Self::new();
        watcher.set_max_events(config.max_events);
        watcher.ignore_hidden_files(config.ignore_hidden);
        watcher.filter_ops(config.ops.iter().copied());
        watcher.ignore(&config.ignore)?;
        watcher.ignore_patterns(config.ignore_patterns.iter().cloned())?;
        Ok(watcher)
    }

    /// Watch `path` and, if it is a directory, its immediate children
    pub fn add(&self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = resolve(path.as_ref())?;
        self.state.lock().add_root(path, false)
    }

    /// Watch `path` and everything beneath it
    pub fn add_recursive(&self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = resolve(path.as_ref())?;
        self.state.lock().add_root(path, true)
    }

    /// Stop watching `path` and, if it is a directory, its immediate children
    pub fn remove(&self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = resolve(path.as_ref())?;
        self.state.lock().remove_root(&path);
        Ok(())
    }

    /// Stop watching `path` and everything tracked beneath it
    pub fn remove_recursive(&self, path: impl AsRef<Path>) -> Result<(), WatchError> {
        let path = resolve(path.as_ref())?;
        self.state.lock().remove_root_recursive(&path);
        Ok(())
    }

    /// Stop watching `paths` and keep them out of every later listing
    pub fn ignore<I, P>(&self, paths: I) -> Result<(), WatchError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths = paths
            .into_iter()
            .map(|p| resolve(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.state.lock().ignore(paths);
        Ok(())
    }

    /// Replace the gitignore-style ignore patterns
    ///
    /// Patterns match absolute paths; entries they exclude are dropped right away.
    pub fn ignore_patterns<I, S>(&self, patterns: I) -> Result<(), WatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = patterns.into_iter().map(Into::into).collect();
        self.state.lock().set_ignore_patterns(&lines)
    }

    /// Cap the number of events delivered per cycle; 0 removes the cap
    pub fn set_max_events(&self, max: usize) {
        self.state.lock().set_max_events(max);
    }

    /// Skip files and directories whose name starts with '.'
    pub fn ignore_hidden_files(&self, ignore: bool) {
        self.state.lock().set_ignore_hidden(ignore);
    }

    /// Forward only these operations; an empty set forwards everything
    pub fn filter_ops(&self, ops: impl IntoIterator<Item = Op>) {
        self.state.lock().filter_ops(ops);
    }

    /// Operations currently forwarded; empty when unfiltered
    pub fn filtered_ops(&self) -> Vec<Op> {
        self.state.lock().policy().ops()
    }

    /// Copy of every tracked path and its last observed metadata
    pub fn watched_files(&self) -> Snapshot {
        self.state.lock().watched_files()
    }

    /// Registered roots and whether each is recursive
    pub fn watched_roots(&self) -> Vec<(PathBuf, bool)> {
        let state = self.state.lock();
        state
            .roots()
            .iter()
            .map(|(path, recursive)| (path.clone(), *recursive))
            .collect()
    }

    /// Explicitly ignored paths
    pub fn ignored_paths(&self) -> Vec<PathBuf> {
        let state = self.state.lock();
        let mut paths: Vec<PathBuf> = state
            .rules()
            .ignored_paths()
            .map(Path::to_path_buf)
            .collect();
        paths.sort();
        paths
    }

    /// Run the poll loop on the calling thread until `close` is called
    ///
    /// Fails with `DurationTooShort` (leaving the watcher startable),
    /// `AlreadyRunning`, or `Closed` once a previous run has ended.
    pub fn start(&self, interval: Duration) -> Result<(), WatchError> {
        if interval < MIN_INTERVAL {
            return Err(WatchError::DurationTooShort);
        }

        self.state.lock().mark_running()?;
        let outlet = self.outlet.lock().clone().ok_or(WatchError::Closed)?;

        self.ready.fire();
        PollLoop::new(&self.state, outlet, self.cancel.receiver(), interval).run();

        // Dropping the last senders ends the public channels
        self.outlet.lock().take();
        self.closed.fire();
        Ok(())
    }

    /// Block until the watcher has started
    pub fn wait(&self) {
        self.ready.wait();
    }

    /// Push a synthetic event to the event channel
    ///
    /// Blocks until the watcher has started and a consumer receives the
    /// event. Without metadata the event carries a placeholder named
    /// "triggered event" stamped with the current time.
    pub fn trigger_event(&self, op: Op, meta: Option<Metadata>) -> Result<(), WatchError> {
        self.wait();

        let outlet = self.outlet.lock().clone().ok_or(WatchError::Closed)?;
        if send_or_cancel(&outlet.events, Event::triggered(op, meta), self.cancel.receiver()) {
            Ok(())
        } else {
            Err(WatchError::Closed)
        }
    }

    /// Stop a running watcher and drop its tracked state
    ///
    /// Does nothing unless the watcher is running. The closed signal fires
    /// once the loop has observed the request.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if !state.is_running() {
                return;
            }
            state.shutdown();
        }
        self.cancel.fire();
    }

    /// Whether the poll loop is running
    pub fn is_running(&self) -> bool {
        self.state.lock().is_running()
    }

    /// Whether the watcher has been closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().is_closed()
    }

    /// Receiver for change events; disconnects once the watcher is closed
    pub fn events(&self) -> Receiver<Event> {
        self.events.clone()
    }

    /// Receiver for listing failures and deleted roots
    pub fn errors(&self) -> Receiver<WatchError> {
        self.errors.clone()
    }

    /// Receiver that disconnects exactly once, when the poll loop has stopped
    pub fn closed(&self) -> Receiver<()> {
        self.closed.receiver().clone()
    }
}

fn resolve(path: &Path) -> Result<PathBuf, WatchError> {
    normalize_path(path).map_err(|source| WatchError::Resolve {
        path: path.to_path_buf(),
        source,
    })
}

//! Watcher configuration

use pollwatch_core::Op;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a polling watcher
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Polling interval in milliseconds (default: 100)
    pub interval_ms: u64,

    /// Maximum events delivered per cycle; 0 means unlimited (default: 0)
    pub max_events: usize,

    /// Skip files and directories whose name starts with '.' (default: false)
    pub ignore_hidden: bool,

    /// Forwarded operations; empty forwards everything
    pub ops: Vec<Op>,

    /// Paths excluded from watching
    pub ignore: Vec<PathBuf>,

    /// Gitignore-style patterns excluded from watching
    pub ignore_patterns: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            max_events: 0,
            ignore_hidden: false,
            ops: Vec::new(),
            ignore: Vec::new(),
            ignore_patterns: Vec::new(),
        }
    }
}

impl WatcherConfig {
    /// Polling interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

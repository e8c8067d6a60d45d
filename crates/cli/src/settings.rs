//! Config file loading and command-line overrides

use crate::Cli;
use anyhow::{Context, Result};
use pollwatch::WatcherConfig;
use std::fs;
use std::path::Path;

/// Read a TOML config file; missing keys keep their defaults
pub fn load_file(path: &Path) -> Result<WatcherConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

/// Build the effective config: file (if any), then flags on top
pub fn resolve(cli: &Cli) -> Result<WatcherConfig> {
    let mut config = match cli.config {
        Some(ref path) => load_file(path)?,
        None => WatcherConfig::default(),
    };

    if let Some(interval) = cli.interval {
        anyhow::ensure!(interval > 0, "Invalid interval: must be a positive number of milliseconds");
        config.interval_ms = interval;
    }
    if let Some(max) = cli.max_events {
        config.max_events = max;
    }
    if let Some(dotfiles) = cli.dotfiles {
        config.ignore_hidden = !dotfiles;
    }
    if !cli.ops.is_empty() {
        config.ops = cli.ops.clone();
    }
    config.ignore.extend(cli.ignore.iter().cloned());
    config.ignore_patterns.extend(cli.patterns.iter().cloned());

    Ok(config)
}

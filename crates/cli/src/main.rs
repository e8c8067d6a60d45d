//! Pollwatch CLI - pollwatch command

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::select;
use pollwatch::{Op, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod output;
mod settings;

use output::Printer;

/// Pollwatch - watch files and directories by polling
#[derive(Parser, Debug)]
#[command(name = "pollwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Files or directories to watch (default: current directory)
    pub paths: Vec<PathBuf>,

    /// Watch directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Polling interval in milliseconds (default: 100)
    #[arg(short, long, value_name = "MS")]
    pub interval: Option<u64>,

    /// Watch dot files (default: true)
    #[arg(long, value_name = "BOOL")]
    pub dotfiles: Option<bool>,

    /// Paths to ignore (comma separated or repeated)
    #[arg(long, value_delimiter = ',')]
    pub ignore: Vec<PathBuf>,

    /// Gitignore-style pattern to ignore (repeatable)
    #[arg(long = "pattern", value_name = "GLOB")]
    pub patterns: Vec<String>,

    /// Only report these operations, e.g. create,write,remove
    #[arg(long, value_delimiter = ',')]
    pub ops: Vec<Op>,

    /// Maximum events reported per poll cycle (0 = unlimited)
    #[arg(long)]
    pub max_events: Option<usize>,

    /// TOML config file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print watched roots and files before starting
    #[arg(long)]
    pub list: bool,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Shell command to run for each event (POLLWATCH_EVENT and POLLWATCH_PATH are set)
    #[arg(long, value_name = "COMMAND")]
    pub cmd: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = settings::resolve(&cli)?;
    let interval = config.interval();

    let watcher = Arc::new(Watcher::with_config(&config).context("Invalid watcher configuration")?);

    let paths = if cli.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.paths.clone()
    };
    for path in &paths {
        let added = if cli.recursive {
            watcher.add_recursive(path)
        } else {
            watcher.add(path)
        };
        added.with_context(|| format!("Failed to watch {}", path.display()))?;
    }

    if cli.list {
        output::print_watched(&watcher);
    }

    let printer = Printer::new(cli.json, cli.cmd.clone());
    let events = watcher.events();
    let errors = watcher.errors();
    let consumer = tokio::task::spawn_blocking(move || -> Result<()> {
        loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(event) => printer.event(&event)?,
                    Err(_) => break,
                },
                recv(errors) -> msg => match msg {
                    Ok(err) => printer.error(&err),
                    Err(_) => break,
                },
            }
        }
        Ok(())
    });

    let mut poller = {
        let watcher = Arc::clone(&watcher);
        tokio::task::spawn_blocking(move || watcher.start(interval))
    };

    info!("Watching {} path(s) every {:?}", paths.len(), interval);

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for Ctrl-C")?;
            debug!("Received Ctrl-C, closing watcher");
            watcher.close();
            poller.await.context("Poll loop panicked")??;
        }
        res = &mut poller => {
            res.context("Poll loop panicked")??;
        }
    }

    consumer.await.context("Event consumer panicked")??;
    info!("Watcher closed");
    Ok(())
}

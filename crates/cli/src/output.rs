//! Event printing and per-event commands

use anyhow::{Context, Result};
use chrono::Local;
use owo_colors::OwoColorize;
use pollwatch::{Event, Op, WatchError, Watcher};
use std::io::{self, Write};
use std::process::Command;
use tracing::warn;

/// Environment variable carrying the operation name for `--cmd`
pub const ENV_EVENT: &str = "POLLWATCH_EVENT";
/// Environment variable carrying the event path for `--cmd`
pub const ENV_PATH: &str = "POLLWATCH_PATH";

/// Writes events to stdout and optionally runs a command for each
pub struct Printer {
    json: bool,
    cmd: Option<String>,
}

impl Printer {
    pub fn new(json: bool, cmd: Option<String>) -> Self {
        Self { json, cmd }
    }

    /// Print one event, then run the per-event command if configured
    pub fn event(&self, event: &Event) -> Result<()> {
        let line = if self.json {
            json_line(event).to_string()
        } else {
            text_line(event)
        };

        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", line).context("Failed to write event")?;
        stdout.flush().context("Failed to flush stdout")?;
        drop(stdout);

        if let Some(ref cmd) = self.cmd {
            run_command(cmd, event);
        }
        Ok(())
    }

    /// Print a watcher error to stderr
    pub fn error(&self, err: &WatchError) {
        eprintln!("{} {}", "error:".red().bold(), err);
    }
}

/// Print the roots and tracked files of a watcher
pub fn print_watched(watcher: &Watcher) {
    println!("{}", "Watching".bold());
    for (root, recursive) in watcher.watched_roots() {
        let mode = if recursive { "recursive" } else { "flat" };
        println!("  {} {}", root.display().to_string().cyan(), format!("({})", mode).dimmed());
    }

    let files = watcher.watched_files();
    println!("{} {}", "Tracked files:".bold(), files.len());
    for (path, meta) in &files {
        let kind = if meta.is_dir { "dir " } else { "file" };
        println!("  {} {}", kind.dimmed(), path.display());
    }
}

fn text_line(event: &Event) -> String {
    let time = Local::now().format("%H:%M:%S%.3f");
    let label = event.op.as_str();
    let op = match event.op {
        Op::Create => label.green().to_string(),
        Op::Write => label.yellow().to_string(),
        Op::Remove => label.red().to_string(),
        Op::Rename | Op::Move => label.magenta().to_string(),
        Op::Chmod => label.blue().to_string(),
    };

    format!("{} {}", time.to_string().dimmed(), event.display_with(op))
}

fn json_line(event: &Event) -> serde_json::Value {
    serde_json::json!({
        "time": Local::now().to_rfc3339(),
        "op": event.op,
        "path": event.path,
        "old_path": event.old_path,
        "name": event.meta.name,
        "is_dir": event.meta.is_dir,
        "size": event.meta.size,
        "mode": event.meta.mode,
    })
}

/// Run `cmd` through the shell; failures are logged and never stop the watcher
fn run_command(cmd: &str, event: &Event) {
    let status = shell(cmd)
        .env(ENV_EVENT, event.op.as_str())
        .env(ENV_PATH, &event.path)
        .status();

    match status {
        Ok(status) if !status.success() => warn!("Command exited with {}: {}", status, cmd),
        Ok(_) => {}
        Err(e) => warn!("Failed to run command '{}': {}", cmd, e),
    }
}

#[cfg(not(windows))]
fn shell(cmd: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    command
}

#[cfg(windows)]
fn shell(cmd: &str) -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C").arg(cmd);
    command
}

//! Per-path metadata captured during a listing pass

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Name given to the metadata of synthetic events
pub const TRIGGERED_NAME: &str = "triggered event";

/// Metadata observed for a single path
///
/// Immutable once captured: a later stat of the same path produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Final path component
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Permission and file-type bits (`st_mode` on Unix)
    pub mode: u32,
    /// Last modification time
    pub modified: SystemTime,
    /// Whether the path is a directory
    pub is_dir: bool,
    /// Inode number where the platform exposes one (informational, never used for identity)
    pub inode: Option<u64>,
}

impl Metadata {
    /// Build from filesystem metadata already fetched for `name`
    pub fn from_fs(name: impl Into<String>, meta: &fs::Metadata) -> Self {
        Self {
            name: name.into(),
            size: meta.len(),
            mode: mode_bits(meta),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            is_dir: meta.is_dir(),
            inode: inode(meta),
        }
    }

    /// Stat `path`, following symlinks
    pub fn stat(path: &Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        Ok(Self::from_fs(file_name(path), &meta))
    }

    /// Placeholder metadata for a synthetic event, stamped with the current time
    pub fn triggered() -> Self {
        Self {
            name: TRIGGERED_NAME.to_string(),
            size: 0,
            mode: 0,
            modified: SystemTime::now(),
            is_dir: false,
            inode: None,
        }
    }

    /// Identity heuristic used for rename/move inference
    ///
    /// Two entries are considered the same file when size, modification time,
    /// mode and directory flag all match. No content is compared, so distinct
    /// files with coincidentally identical metadata will match.
    pub fn same_file(&self, other: &Metadata) -> bool {
        self.size == other.size
            && self.modified == other.modified
            && self.mode == other.mode
            && self.is_dir == other.is_dir
    }
}

/// Final component of `path`, or the whole path for roots like `/`
pub fn file_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.to_string_lossy().into_owned(),
    }
}

#[cfg(unix)]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.mode()
}

#[cfg(not(unix))]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    // Only the read-only flag is portable
    let perm = if meta.permissions().readonly() { 0o444 } else { 0o666 };
    if meta.is_dir() {
        perm | 0o040000
    } else {
        perm
    }
}

#[cfg(unix)]
fn inode(meta: &fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn inode(_meta: &fs::Metadata) -> Option<u64> {
    None
}

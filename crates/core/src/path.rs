//! Path normalization helpers

use std::io;
use std::path::{Component, Path, PathBuf};

/// Normalize a path for use as a snapshot key
///
/// - Relative paths are resolved against the current directory
/// - `.` components are dropped
/// - `..` components are resolved lexically (symlinks are not followed)
pub fn normalize_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(clean(&absolute))
}

/// Lexically clean an already absolute path
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // Popping past the root leaves the root in place
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether the final component of `path` starts with the hidden-file marker
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

// src/workspace.rs

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Delete every file directly inside `dir` (non-recursive). Entries that
/// cannot be deleted are logged and skipped so the remaining deletions still
/// run. Returns the number of files removed.
pub fn clean_dir(dir: &Path) -> Result<usize> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?;

    let mut removed = 0;
    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %dir.display(), "unreadable directory entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            warn!(path = %path.display(), "leaving subdirectory in place");
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), "failed to delete: {}", e),
        }
    }
    Ok(removed)
}

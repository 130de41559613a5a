//! Atomic file replacement.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// Replace `path` with `content` in a single rename.
///
/// Data goes to a uniquely named sibling first, is synced, and is then
/// renamed over the target so readers see either the old or the new file.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_sibling(path);
    let result = write_and_rename(&temp_path, path, content);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result?;

    debug!(path = %path.display(), bytes = content.len(), "File replaced");
    Ok(())
}

/// Remove a file, treating absence as success.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
            Err(e)
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        Uuid::new_v4().simple()
    );
    path.with_file_name(temp_name)
}

fn write_and_rename(temp_path: &Path, path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp_path, path)
}

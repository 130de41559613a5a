//! Relative path validation.
//!
//! Configuration names supplied by operators are joined onto fixed
//! directories and must stay inside them.

use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::error::{DaemonError, ValidationErrorKind};

/// Validate that `path` is relative and cannot climb out of its base.
pub fn validate_relative_path(path: &str) -> Result<PathBuf, DaemonError> {
    let candidate = Path::new(path);

    let escapes = candidate.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });

    if path.is_empty() || escapes {
        warn!(path = %path, "Rejected configuration path");
        return Err(DaemonError::Validation {
            kind: ValidationErrorKind::PathTraversal {
                path: candidate.to_path_buf(),
            },
        });
    }

    Ok(candidate.to_path_buf())
}

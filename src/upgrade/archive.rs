//! Read access to an uploaded upgrade package.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::{DaemonError, DaemonResult, NotFoundKind, PackageErrorKind};

/// One entry of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    /// Path inside the archive, `/` separated.
    pub path: String,
    pub size: u64,
    pub is_dir: bool,
}

/// An opened zip package.
pub struct PackageArchive {
    archive: ZipArchive<File>,
}

impl PackageArchive {
    /// Open the package at `path`.
    pub fn open(path: &Path) -> DaemonResult<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                DaemonError::NotFound {
                    kind: NotFoundKind::Package,
                }
            } else {
                read_error(e)
            }
        })?;

        let archive = ZipArchive::new(file).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Package is not a readable archive");
            DaemonError::Package {
                kind: PackageErrorKind::UnsupportedType,
            }
        })?;

        debug!(path = %path.display(), entries = archive.len(), "Package opened");
        Ok(Self { archive })
    }

    /// List every entry in archive order.
    pub fn entries(&mut self) -> DaemonResult<Vec<PackageEntry>> {
        let mut entries = Vec::with_capacity(self.archive.len());
        for index in 0..self.archive.len() {
            let entry = self.archive.by_index_raw(index).map_err(read_error)?;
            entries.push(PackageEntry {
                path: entry.name().to_string(),
                size: entry.size(),
                is_dir: entry.is_dir(),
            });
        }
        Ok(entries)
    }

    /// Extract every entry below `package_root` into `target`.
    ///
    /// The package root itself is stripped, so `root/bin/x` lands at
    /// `target/bin/x`. Existing files are overwritten in place. Returns the
    /// number of files written.
    pub fn extract(&mut self, package_root: &str, target: &Path) -> DaemonResult<usize> {
        let mut written = 0;

        for index in 0..self.archive.len() {
            let mut entry = self.archive.by_index(index).map_err(read_error)?;

            let enclosed: PathBuf = match entry.enclosed_name() {
                Some(path) => path.to_path_buf(),
                None => {
                    warn!(entry = %entry.name(), "Package entry escapes the archive root");
                    return Err(unsupported_format());
                }
            };
            let relative = enclosed
                .strip_prefix(package_root)
                .map_err(|_| unsupported_format())?;
            if relative.as_os_str().is_empty() {
                continue;
            }
            let destination = target.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&destination).map_err(|e| write_error(&destination, e))?;
                continue;
            }

            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| write_error(&destination, e))?;
            }
            let mut out = File::create(&destination).map_err(|e| write_error(&destination, e))?;
            io::copy(&mut entry, &mut out).map_err(|e| write_error(&destination, e))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    fs::set_permissions(&destination, fs::Permissions::from_mode(mode & 0o7777))
                        .map_err(|e| write_error(&destination, e))?;
                }
            }

            debug!(path = %destination.display(), bytes = entry.size(), "Extracted");
            written += 1;
        }

        Ok(written)
    }
}

fn read_error(e: impl std::fmt::Display) -> DaemonError {
    DaemonError::Package {
        kind: PackageErrorKind::Read {
            message: e.to_string(),
        },
    }
}

fn write_error(path: &Path, e: io::Error) -> DaemonError {
    DaemonError::Package {
        kind: PackageErrorKind::Write {
            path: PathBuf::from(path),
            message: e.to_string(),
        },
    }
}

fn unsupported_format() -> DaemonError {
    DaemonError::Package {
        kind: PackageErrorKind::UnsupportedFormat,
    }
}

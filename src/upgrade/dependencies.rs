//! Package root and affected-definition discovery.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::config::DEFINITIONS_DIR;
use crate::error::{DaemonError, DaemonResult, PackageErrorKind};

/// What a package touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLayout {
    /// Top-level directory shared by every entry.
    pub root: String,
    /// Definitions whose module files the package replaces.
    pub affected: BTreeSet<String>,
}

impl PackageLayout {
    /// Resolve the package root and affected definitions from entry paths.
    ///
    /// Module files at `<root>/services/<id>/...` mark `<id>` as affected.
    /// Every entry must share the same first path segment.
    pub fn resolve<'a, I>(paths: I, module_suffix: &str) -> DaemonResult<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut root: Option<String> = None;
        let mut affected = BTreeSet::new();

        for path in paths {
            let normalized = path.replace('\\', "/");
            let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
            let Some(top) = segments.first() else {
                continue;
            };

            if let Some(existing) = &root {
                if existing.as_str() != *top {
                    warn!(expected = %existing, found = %top, "Package entries disagree on root");
                    return Err(unsupported_format());
                }
            } else {
                root = Some(top.to_string());
            }

            let is_module = normalized.ends_with(module_suffix);
            if is_module && segments.len() >= 4 && segments[1] == DEFINITIONS_DIR {
                debug!(definition = %segments[2], entry = %path, "Module entry affects definition");
                affected.insert(segments[2].to_string());
            }
        }

        let root = root.ok_or_else(unsupported_format)?;
        Ok(Self { root, affected })
    }
}

fn unsupported_format() -> DaemonError {
    DaemonError::Package {
        kind: PackageErrorKind::UnsupportedFormat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_root_and_affected() {
        let layout = PackageLayout::resolve(
            ["pkgroot/services/svcA/svcA.mod", "pkgroot/other/file.txt"],
            ".mod",
        )
        .unwrap();

        assert_eq!(layout.root, "pkgroot");
        assert_eq!(layout.affected, BTreeSet::from(["svcA".to_string()]));
    }

    #[test]
    fn test_disagreeing_roots() {
        let result = PackageLayout::resolve(["rootA/x", "rootB/y"], ".mod");
        match result {
            Err(e) => assert_eq!(e.to_string(), "Unsupported package format"),
            Ok(layout) => panic!("unexpected: {:?}", layout),
        }
    }

    #[test]
    fn test_empty_package() {
        assert!(PackageLayout::resolve(Vec::<&str>::new(), ".so").is_err());
        assert!(PackageLayout::resolve(["/", ""], ".so").is_err());
    }

    #[test]
    fn test_non_module_and_shallow_entries() {
        let layout = PackageLayout::resolve(
            [
                "pkg/",
                "pkg/services/",
                "pkg/services/svcB/",
                "pkg/services/svcB/config.toml",
                "pkg/services/svcC/lib/helper.so",
                "pkg/bin/servman-host.so",
                "pkg\\services\\svcD\\svcD.so",
            ],
            ".so",
        )
        .unwrap();

        let affected: Vec<_> = layout.affected.iter().map(String::as_str).collect();
        assert_eq!(affected, vec!["svcC", "svcD"]);
    }
}

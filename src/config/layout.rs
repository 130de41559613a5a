//! On-disk layout of an installation root.

use std::path::{Path, PathBuf};

use super::settings::{resolve, PathsConfig};

/// Definitions live under `<root>/services/<id>/`.
pub const DEFINITIONS_DIR: &str = "services";
/// Generated instance configuration lives under `<root>/conf/`.
pub const CONF_DIR: &str = "conf";
/// Host log files live under `<root>/logs/`.
pub const LOGS_DIR: &str = "logs";
/// Name of the staged upgrade archive.
pub const PACKAGE_FILE: &str = "upgrade.zip";

/// Absolute paths derived from [`PathsConfig`].
#[derive(Debug, Clone)]
pub struct Layout {
    pub root: PathBuf,
    pub definitions_dir: PathBuf,
    pub conf_dir: PathBuf,
    pub services_file: PathBuf,
    pub staging_dir: PathBuf,
    pub host_binary: PathBuf,
    pub manager_id: String,
    pub module_suffix: String,
}

impl Layout {
    /// Layout rooted at `root` with default relative locations.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let paths = PathsConfig {
            root: root.into(),
            ..PathsConfig::default()
        };
        Self::from_paths(&paths)
    }

    pub fn from_paths(paths: &PathsConfig) -> Self {
        let root = paths.root.clone();
        Self {
            definitions_dir: root.join(DEFINITIONS_DIR),
            conf_dir: root.join(CONF_DIR),
            services_file: resolve(&root, &paths.services_file),
            staging_dir: resolve(&root, &paths.staging_dir),
            host_binary: resolve(&root, &paths.host_binary),
            manager_id: paths.manager_id.clone(),
            module_suffix: paths.module_suffix.clone(),
            root,
        }
    }

    /// Override the module suffix.
    pub fn with_module_suffix(mut self, suffix: &str) -> Self {
        self.module_suffix = suffix.to_string();
        self
    }

    /// Fixed location of the uploaded upgrade archive.
    pub fn package_path(&self) -> PathBuf {
        self.staging_dir.join(PACKAGE_FILE)
    }

    /// Generated configuration file of an instance.
    pub fn instance_config_path(&self, config: &str) -> PathBuf {
        self.conf_dir.join(config)
    }

    /// Configuration template shipped inside a definition directory.
    pub fn definition_config_path(&self, id: &str, config: &str) -> PathBuf {
        self.definitions_dir.join(id).join(config)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = Layout::new("/opt/servman");
        assert_eq!(layout.definitions_dir, PathBuf::from("/opt/servman/services"));
        assert_eq!(
            layout.package_path(),
            PathBuf::from("/opt/servman/tmp/upgrade.zip")
        );
        assert_eq!(
            layout.instance_config_path("a.json"),
            PathBuf::from("/opt/servman/conf/a.json")
        );
        assert_eq!(
            layout.definition_config_path("svcA", "a.json"),
            PathBuf::from("/opt/servman/services/svcA/a.json")
        );
    }
}

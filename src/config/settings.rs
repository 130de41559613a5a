//! Configuration settings for the servman daemon.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::DaemonError;

use super::layout::Layout;

/// Main configuration structure for the daemon.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Management plane listener.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Address to bind.
    #[serde(default = "default_address")]
    pub address: String,
    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory with the operator web UI, relative to the root.
    #[serde(default = "default_http_directory")]
    pub directory: PathBuf,
}

/// Installation layout.
///
/// Relative paths are resolved against `root`.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Installation root.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Persisted instances file.
    #[serde(default = "default_services_file")]
    pub services_file: PathBuf,
    /// Where uploaded packages are staged.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Generic service host executed by registered OS services.
    #[serde(default = "default_host_binary")]
    pub host_binary: PathBuf,
    /// Definition directory of the manager itself, skipped during scans.
    #[serde(default = "default_manager_id")]
    pub manager_id: String,
    /// File suffix identifying service modules inside definitions and packages.
    #[serde(default = "default_module_suffix")]
    pub module_suffix: String,
}

/// Service supervisor backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    /// "systemd" or "memory".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Directory receiving generated unit files.
    #[serde(default = "default_unit_dir")]
    pub unit_dir: PathBuf,
    /// Timeout for each supervisor invocation.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8180
}

fn default_http_directory() -> PathBuf {
    PathBuf::from("http")
}

fn default_root() -> PathBuf {
    PathBuf::from("/opt/servman")
}

fn default_services_file() -> PathBuf {
    PathBuf::from("conf/services.json")
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_host_binary() -> PathBuf {
    PathBuf::from("bin/servman-host")
}

fn default_manager_id() -> String {
    "servman".to_string()
}

fn default_module_suffix() -> String {
    std::env::consts::DLL_SUFFIX.to_string()
}

fn default_backend() -> String {
    "systemd".to_string()
}

fn default_unit_dir() -> PathBuf {
    PathBuf::from("/etc/systemd/system")
}

fn default_timeout() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            directory: default_http_directory(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            services_file: default_services_file(),
            staging_dir: default_staging_dir(),
            host_binary: default_host_binary(),
            manager_id: default_manager_id(),
            module_suffix: default_module_suffix(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            unit_dir: default_unit_dir(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DaemonError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DaemonError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::parse(&content).map_err(|e| match e {
            DaemonError::Config { message } => DaemonError::Config {
                message: format!("{} ({})", message, path.display()),
            },
            other => other,
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, DaemonError> {
        let settings: Settings = toml::from_str(content).map_err(|e| DaemonError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Resolved on-disk layout.
    pub fn layout(&self) -> Layout {
        Layout::from_paths(&self.paths)
    }

    /// Directory served as static content.
    pub fn http_directory(&self) -> PathBuf {
        resolve(&self.paths.root, &self.http.directory)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<(), DaemonError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        let valid_backends = ["systemd", "memory"];
        if !valid_backends.contains(&self.control.backend.as_str()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid control backend '{}'. Valid backends: {:?}",
                    self.control.backend, valid_backends
                ),
            });
        }

        if self.http.port == 0 {
            return Err(DaemonError::Config {
                message: "HTTP port must be non-zero".to_string(),
            });
        }

        if self.paths.manager_id.is_empty() || self.paths.module_suffix.is_empty() {
            return Err(DaemonError::Config {
                message: "paths.manager_id and paths.module_suffix must be set".to_string(),
            });
        }

        Ok(())
    }
}

/// Join `path` onto `root` unless it is already absolute.
pub(crate) fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(default_port(), 8180);
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_log_format(), "pretty");
        assert_eq!(default_manager_id(), "servman");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings.http.address, "0.0.0.0");
        assert_eq!(settings.control.backend, "systemd");
        assert_eq!(settings.paths.root, PathBuf::from("/opt/servman"));
    }

    #[test]
    fn test_relative_paths_resolve_against_root() {
        let settings = Settings::parse(
            r#"
            [http]
            port = 9000
            directory = "web"

            [paths]
            root = "/srv/app"
            services_file = "/var/lib/servman/services.json"
            "#,
        )
        .unwrap();

        assert_eq!(settings.http_directory(), PathBuf::from("/srv/app/web"));
        let layout = settings.layout();
        assert_eq!(
            layout.services_file,
            PathBuf::from("/var/lib/servman/services.json")
        );
        assert_eq!(layout.staging_dir, PathBuf::from("/srv/app/tmp"));
    }

    #[test]
    fn test_invalid_backend_rejected() {
        let result = Settings::parse("[control]\nbackend = \"launchd\"\n");
        assert!(matches!(result, Err(DaemonError::Config { .. })));
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let result = Settings::parse("[logging]\nlevel = \"loud\"\n");
        assert!(matches!(result, Err(DaemonError::Config { .. })));
    }
}

//! Definitions, instances and the attributes they share.

use serde::Serialize;

use super::status::ServiceStatus;

/// Default log level when none is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Default retention used by the definition loader.
pub const DEFAULT_LOG_KEEP: i64 = 7;
/// Default rotation threshold (MiB) used by the definition loader.
pub const DEFAULT_LOG_SIZE: i64 = 7;
/// Version text used when none is given.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Module binary selector plus its runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryRef {
    /// Module file name inside the definition directory.
    pub name: String,
    /// Configuration file, relative to the configuration directory.
    #[serde(rename = "configuration")]
    pub config: String,
    pub version: String,
}

/// Log sink flavour of the service host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    #[default]
    Daily,
    Rotate,
}

impl LogType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(LogType::Daily),
            "rotate" => Some(LogType::Rotate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogType::Daily => "daily",
            LogType::Rotate => "rotate",
        }
    }
}

/// Logging parameters handed to the service host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSpec {
    /// Log file name; empty means the host executable name.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LogType,
    pub level: String,
    /// Retention count.
    pub keep: i64,
    /// Rotation threshold in MiB.
    pub size: i64,
}

impl Default for LogSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: LogType::Daily,
            level: DEFAULT_LOG_LEVEL.to_string(),
            keep: DEFAULT_LOG_KEEP,
            size: DEFAULT_LOG_SIZE,
        }
    }
}

/// A deployable template backed by a directory of artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub library: LibraryRef,
    pub log: LogSpec,
}

impl Definition {
    /// Start a new instance carrying this definition's defaults.
    pub fn instantiate(&self, name: &str) -> Instance {
        Instance {
            id: self.id.clone(),
            name: name.to_string(),
            description: self.description.clone(),
            library: self.library.clone(),
            log: self.log.clone(),
            status: ServiceStatus::Unknown,
        }
    }
}

/// A named deployment of a definition, bound to an OS service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Owning definition id.
    pub id: String,
    /// Unique instance name, also the OS service name.
    pub name: String,
    pub description: String,
    pub library: LibraryRef,
    pub log: LogSpec,
    /// Last observed status. Never persisted.
    pub status: ServiceStatus,
}

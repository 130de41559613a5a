//! Named module factories.
//!
//! `--service.lib` selects a module by the file stem of its path, so
//! `services/heartbeat/heartbeat.so` resolves to the `heartbeat` factory.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::error::{DaemonError, NotFoundKind};
use crate::manager::ManagerService;

use super::sample::HeartbeatService;
use super::traits::ManagedService;

/// Constructor of a fresh module instance.
pub type ModuleFactory = fn() -> Box<dyn ManagedService>;

/// Registry of modules the host can run.
pub struct ModuleRegistry {
    factories: HashMap<&'static str, ModuleFactory>,
}

impl ModuleRegistry {
    /// Registry with the built-in modules.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("heartbeat", || -> Box<dyn ManagedService> {
            Box::new(HeartbeatService::default())
        });
        registry.register("servman", || -> Box<dyn ManagedService> {
            Box::new(ManagerService::default())
        });
        registry
    }

    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, key: &'static str, factory: ModuleFactory) {
        self.factories.insert(key, factory);
    }

    /// Instantiate the module selected by a `service.lib` value.
    pub fn create(&self, library: &str) -> Result<Box<dyn ManagedService>, DaemonError> {
        let key = module_key(library);
        let factory = self.factories.get(key.as_str()).ok_or_else(|| DaemonError::NotFound {
            kind: NotFoundKind::Module { key: key.clone() },
        })?;
        debug!(module = %key, "Module resolved");
        Ok(factory())
    }

    /// All registered keys, sorted.
    pub fn list(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.factories.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Module key of a library path: its file stem with any `lib` prefix removed.
pub fn module_key(library: &str) -> String {
    let stem = Path::new(library)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match stem.strip_prefix("lib") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_key() {
        assert_eq!(module_key("services/heartbeat/heartbeat.so"), "heartbeat");
        assert_eq!(module_key("services/servman/libservman.so"), "servman");
        assert_eq!(module_key("worker.dll"), "worker");
        assert_eq!(module_key("lib"), "lib");
    }

    #[test]
    fn test_builtin_modules() {
        let registry = ModuleRegistry::new();
        assert_eq!(registry.list(), vec!["heartbeat", "servman"]);
        let module = registry.create("services/heartbeat/heartbeat.so").unwrap();
        assert_eq!(module.name(), "heartbeat");
    }

    #[test]
    fn test_unknown_module() {
        let registry = ModuleRegistry::new();
        let result = registry.create("services/ghost/ghost.so");
        assert!(matches!(result, Err(e) if e.to_string() == "Service module(ghost) is not registered"));
    }
}

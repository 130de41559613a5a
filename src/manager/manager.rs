//! Serialized access to the registry.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::info;

use crate::config::Layout;
use crate::control::ServiceControl;
use crate::error::DaemonResult;
use crate::storage::remove_if_exists;
use crate::model::Instance;
use crate::registry::{Action, Registry, Target};
use crate::upgrade::{UpgradeReport, Upgrader};

/// The management plane.
///
/// Mutations and upgrades take the write guard, so at most one of them
/// runs at a time. Listing and detail reads share the read guard.
pub struct Manager {
    layout: Layout,
    registry: RwLock<Registry>,
}

impl Manager {
    pub fn load(layout: Layout, control: Arc<dyn ServiceControl>) -> DaemonResult<Self> {
        let registry = Registry::load(layout, control)?;
        info!(
            definitions = registry.definitions().len(),
            services = registry.instances().len(),
            "Registry loaded"
        );
        Ok(Self::new(registry))
    }

    pub fn new(registry: Registry) -> Self {
        Self {
            layout: registry.layout().clone(),
            registry: RwLock::new(registry),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Where uploads are staged for [`upgrade`](Self::upgrade).
    pub fn package_path(&self) -> PathBuf {
        self.layout.package_path()
    }

    pub fn list_instances(&self) -> Vec<Value> {
        self.read().list_instances()
    }

    pub fn list_definitions(&self) -> Vec<Value> {
        self.read().list_definitions()
    }

    pub fn get_detail(&self, target: Target, index: &str) -> DaemonResult<Value> {
        self.read().get_detail(target, index)
    }

    pub fn set_detail(
        &self,
        target: Target,
        index: &str,
        option: &str,
        configuration: &str,
    ) -> DaemonResult<()> {
        self.write().set_detail(target, index, option, configuration)
    }

    pub fn create(
        &self,
        definition_id: &str,
        name: &str,
        option: &str,
        configuration: &str,
    ) -> DaemonResult<Instance> {
        self.write().create(definition_id, name, option, configuration)
    }

    pub fn delete(&self, name: &str) -> DaemonResult<()> {
        self.write().delete(name)
    }

    pub fn control(&self, name: &str, action: Action) -> DaemonResult<()> {
        self.write().control_instance(name, action)
    }

    /// Apply the staged package.
    /// Move a fully received upload into the package slot.
    ///
    /// Holds the write guard, so a package never lands while an upgrade runs
    /// and concurrent uploads replace each other whole.
    pub fn stage_package(&self, part: &Path) -> DaemonResult<PathBuf> {
        let registry = self.write();
        let target = registry.layout().package_path();
        if let Err(e) = fs::rename(part, &target) {
            let _ = remove_if_exists(part);
            return Err(e.into());
        }
        info!(path = %target.display(), "Upgrade package staged");
        Ok(target)
    }

    pub fn upgrade(&self) -> DaemonResult<UpgradeReport> {
        let registry = self.write();
        let mut upgrader = Upgrader::new(registry.layout(), registry.control());
        upgrader.run(registry.instances())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::MemoryControl;
    use crate::error::DaemonError;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<MemoryControl>, Arc<Manager>) {
        let dir = TempDir::new().unwrap();
        let def = dir.path().join("services").join("svcA");
        fs::create_dir_all(&def).unwrap();
        fs::write(
            def.join("prototype.json"),
            r#"{"name": "Service A", "library": "svcA.so", "configuration": "svcA.toml", "log": {"type": "daily"}}"#,
        )
        .unwrap();

        let control = Arc::new(MemoryControl::new());
        let manager = Manager::load(Layout::new(dir.path()), control.clone()).unwrap();
        (dir, control, Arc::new(manager))
    }

    #[test]
    fn test_create_then_list() {
        let (_dir, _control, manager) = setup();
        manager.create("svcA", "a1", "--log.level=debug", "x = 1").unwrap();

        let list = manager.list_instances();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], "a1");
        assert_eq!(list[0]["log"]["level"], "debug");
    }

    #[test]
    fn test_concurrent_creates_keep_names_unique() {
        let (_dir, _control, manager) = setup();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || manager.create("svcA", "same", "", "").is_ok())
            })
            .collect();
        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(created, 1);
        assert_eq!(manager.list_instances().len(), 1);
    }

    #[test]
    fn test_upgrade_without_package() {
        let (_dir, _control, manager) = setup();
        let result = manager.upgrade();
        assert!(matches!(result, Err(DaemonError::NotFound { .. })));
    }

    #[test]
    fn test_concurrent_staging_keeps_one_whole_package() {
        let (dir, _control, manager) = setup();
        let staging = dir.path().join("tmp");
        fs::create_dir_all(&staging).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|n| {
                let manager = Arc::clone(&manager);
                let part = staging.join(format!(".upgrade.zip.{}.part", n));
                fs::write(&part, format!("package {}", n).repeat(1000)).unwrap();
                thread::spawn(move || manager.stage_package(&part).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), manager.package_path());
        }

        let staged = fs::read_to_string(manager.package_path()).unwrap();
        assert!((0..4).any(|n| staged == format!("package {}", n).repeat(1000)));
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 1);
    }

    #[test]
    fn test_stage_missing_part_fails() {
        let (dir, _control, manager) = setup();
        let result = manager.stage_package(&dir.path().join("tmp").join("absent.part"));
        assert!(matches!(result, Err(DaemonError::Io(_))));
        assert!(!manager.package_path().exists());
    }

    #[test]
    fn test_control_unknown_service() {
        let (_dir, control, manager) = setup();
        assert!(manager.control("ghost", Action::Start).is_err());
        assert!(control.history().is_empty());
    }
}

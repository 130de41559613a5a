//! In-process supervisor.
//!
//! Keeps registrations in a table instead of touching the OS. Used for dry
//! runs and by the test suites.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::error::{DaemonError, DaemonResult};
use crate::model::ServiceStatus;

use super::traits::ServiceControl;

#[derive(Debug, Clone)]
struct Registration {
    description: String,
    command_line: String,
    status: ServiceStatus,
}

#[derive(Default)]
struct State {
    services: HashMap<String, Registration>,
    failing_starts: HashSet<String>,
    history: Vec<String>,
}

/// Supervisor backed by an in-memory table.
#[derive(Default)]
pub struct MemoryControl {
    state: Mutex<State>,
}

impl MemoryControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn not_loaded(name: &str) -> DaemonError {
        DaemonError::Control {
            message: format!("Unit {}.service not loaded.", name),
        }
    }

    /// Force the observed status of a registered service.
    pub fn set_status(&self, name: &str, status: ServiceStatus) -> DaemonResult<()> {
        let mut state = self.lock();
        let service = state
            .services
            .get_mut(name)
            .ok_or_else(|| Self::not_loaded(name))?;
        service.status = status;
        Ok(())
    }

    /// Make every later `start` of `name` fail.
    pub fn fail_start(&self, name: &str) {
        self.lock().failing_starts.insert(name.to_string());
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().services.contains_key(name)
    }

    /// Command line a service was registered with.
    pub fn command_line(&self, name: &str) -> Option<String> {
        self.lock().services.get(name).map(|s| s.command_line.clone())
    }

    pub fn description(&self, name: &str) -> Option<String> {
        self.lock().services.get(name).map(|s| s.description.clone())
    }

    /// Lifecycle calls in the order received, as `"<action> <name>"`.
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }
}

impl ServiceControl for MemoryControl {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn register(
        &self,
        name: &str,
        _display_name: &str,
        description: &str,
        command_line: &str,
    ) -> DaemonResult<()> {
        let mut state = self.lock();
        if state.services.contains_key(name) {
            return Err(DaemonError::Control {
                message: format!("Unit {}.service already exists", name),
            });
        }
        state.services.insert(
            name.to_string(),
            Registration {
                description: description.to_string(),
                command_line: command_line.to_string(),
                status: ServiceStatus::Stopped,
            },
        );
        state.history.push(format!("register {}", name));
        info!(service = %name, "Service registered (memory)");
        Ok(())
    }

    fn unregister(&self, name: &str) -> DaemonResult<()> {
        let mut state = self.lock();
        state
            .services
            .remove(name)
            .ok_or_else(|| Self::not_loaded(name))?;
        state.history.push(format!("unregister {}", name));
        Ok(())
    }

    fn start(&self, name: &str) -> DaemonResult<()> {
        let mut state = self.lock();
        state.history.push(format!("start {}", name));
        if state.failing_starts.contains(name) {
            return Err(DaemonError::Control {
                message: format!("Job for {}.service failed.", name),
            });
        }
        let service = state
            .services
            .get_mut(name)
            .ok_or_else(|| Self::not_loaded(name))?;
        service.status = ServiceStatus::Running;
        Ok(())
    }

    fn stop(&self, name: &str) -> DaemonResult<()> {
        let mut state = self.lock();
        state.history.push(format!("stop {}", name));
        let service = state
            .services
            .get_mut(name)
            .ok_or_else(|| Self::not_loaded(name))?;
        service.status = ServiceStatus::Stopped;
        Ok(())
    }

    fn query_status(&self, name: &str) -> DaemonResult<ServiceStatus> {
        self.lock()
            .services
            .get(name)
            .map(|s| s.status)
            .ok_or_else(|| Self::not_loaded(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let control = MemoryControl::new();
        control.register("a1", "a1", "desc", "/bin/true").unwrap();
        assert_eq!(control.query_status("a1").unwrap(), ServiceStatus::Stopped);

        control.start("a1").unwrap();
        assert_eq!(control.query_status("a1").unwrap(), ServiceStatus::Running);

        control.stop("a1").unwrap();
        control.unregister("a1").unwrap();
        assert!(!control.is_registered("a1"));
        assert_eq!(
            control.history(),
            vec!["register a1", "start a1", "stop a1", "unregister a1"]
        );
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let control = MemoryControl::new();
        control.register("a1", "a1", "", "/bin/true").unwrap();
        let result = control.register("a1", "a1", "", "/bin/true");
        assert!(matches!(result, Err(DaemonError::Control { .. })));
    }

    #[test]
    fn test_unknown_service() {
        let control = MemoryControl::new();
        let result = control.query_status("ghost");
        assert!(
            matches!(result, Err(DaemonError::Control { message }) if message == "Unit ghost.service not loaded.")
        );
    }

    #[test]
    fn test_failing_start() {
        let control = MemoryControl::new();
        control.register("a1", "a1", "", "/bin/true").unwrap();
        control.fail_start("a1");
        assert!(control.start("a1").is_err());
        assert_eq!(control.query_status("a1").unwrap(), ServiceStatus::Stopped);
    }
}

//! Service supervisor interface.

use crate::error::DaemonResult;
use crate::model::ServiceStatus;

/// Adapter over the OS service supervisor.
///
/// Implementations report failures as [`crate::error::DaemonError::Control`]
/// carrying the supervisor's own text; they never invent wording.
pub trait ServiceControl: Send + Sync {
    /// Backend identifier (e.g., "systemd").
    fn name(&self) -> &'static str;

    /// Register a new auto-start OS service running `command_line`.
    ///
    /// A failure part way through must leave no registration behind.
    fn register(
        &self,
        name: &str,
        display_name: &str,
        description: &str,
        command_line: &str,
    ) -> DaemonResult<()>;

    /// Remove an OS service registration.
    fn unregister(&self, name: &str) -> DaemonResult<()>;

    fn start(&self, name: &str) -> DaemonResult<()>;

    fn stop(&self, name: &str) -> DaemonResult<()>;

    /// Current status as seen by the supervisor.
    fn query_status(&self, name: &str) -> DaemonResult<ServiceStatus>;
}

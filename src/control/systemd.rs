//! systemd backend.
//!
//! Registration writes a unit file and enables it; lifecycle calls go
//! through `systemctl`.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{DaemonError, DaemonResult};
use crate::executor::{SubprocessBuilder, SubprocessResult};
use crate::model::ServiceStatus;
use crate::storage::{remove_if_exists, write_atomic};

use super::traits::ServiceControl;

/// Controls services through systemd.
pub struct SystemdControl {
    unit_dir: PathBuf,
    timeout: Duration,
    /// Program plus leading arguments used in place of `systemctl`.
    command: Vec<String>,
}

impl SystemdControl {
    pub fn new(unit_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            timeout,
            command: vec!["systemctl".to_string()],
        }
    }

    /// Use a different `systemctl` invocation.
    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command: Vec<String> = command.into_iter().map(Into::into).collect();
        if !command.is_empty() {
            self.command = command;
        }
        self
    }

    fn unit_name(name: &str) -> String {
        format!("{}.service", name)
    }

    fn unit_path(&self, name: &str) -> PathBuf {
        self.unit_dir.join(Self::unit_name(name))
    }

    fn systemctl(&self, args: &[&str]) -> DaemonResult<SubprocessResult> {
        SubprocessBuilder::new(&self.command[0])
            .args(&self.command[1..])
            .args(args.iter().copied())
            .timeout(self.timeout)
            .run()
    }

    /// Run `systemctl` and turn a non-zero exit into an error.
    fn check(&self, args: &[&str]) -> DaemonResult<()> {
        let result = self.systemctl(args)?;
        if !result.success {
            let message = result.failure_text();
            warn!(args = ?args, error = %message, "systemctl failed");
            return Err(DaemonError::Control { message });
        }
        Ok(())
    }

    fn enable(&self, name: &str) -> DaemonResult<()> {
        self.check(&["daemon-reload"])?;
        self.check(&["enable", &Self::unit_name(name)])
    }
}

/// Render a unit file for a service host command line.
pub fn render_unit(display_name: &str, description: &str, command_line: &str) -> String {
    let description = if description.trim().is_empty() {
        display_name
    } else {
        description
    };
    // Unit files are line based.
    let description = description.replace(['\r', '\n'], " ");

    format!(
        "[Unit]\n\
         Description={description}\n\
         After=network.target\n\
         \n\
         [Service]\n\
         Type=simple\n\
         ExecStart={command_line}\n\
         Restart=on-failure\n\
         KillSignal=SIGTERM\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n"
    )
}

/// Map `systemctl is-active` output onto a status.
pub fn parse_active_state(state: &str) -> ServiceStatus {
    match state.trim() {
        "active" => ServiceStatus::Running,
        "activating" | "reloading" => ServiceStatus::StartPending,
        "deactivating" => ServiceStatus::StopPending,
        "inactive" | "failed" => ServiceStatus::Stopped,
        _ => ServiceStatus::Unknown,
    }
}

impl ServiceControl for SystemdControl {
    fn name(&self) -> &'static str {
        "systemd"
    }

    fn register(
        &self,
        name: &str,
        display_name: &str,
        description: &str,
        command_line: &str,
    ) -> DaemonResult<()> {
        let unit_path = self.unit_path(name);
        if unit_path.exists() {
            return Err(DaemonError::Control {
                message: format!("Unit {} already exists", Self::unit_name(name)),
            });
        }

        let unit = render_unit(display_name, description, command_line);
        write_atomic(&unit_path, unit.as_bytes()).map_err(|e| DaemonError::Control {
            message: format!("Failed to write {}: {}", unit_path.display(), e),
        })?;

        if let Err(e) = self.enable(name) {
            warn!(service = %name, error = %e, "Registration failed, removing unit");
            let _ = remove_if_exists(&unit_path);
            if let Err(reload) = self.check(&["daemon-reload"]) {
                warn!(error = %reload, "daemon-reload after rollback failed");
            }
            return Err(e);
        }

        info!(service = %name, unit = %unit_path.display(), "Service registered");
        Ok(())
    }

    fn unregister(&self, name: &str) -> DaemonResult<()> {
        self.check(&["disable", &Self::unit_name(name)])?;

        let unit_path = self.unit_path(name);
        remove_if_exists(&unit_path).map_err(|e| DaemonError::Control {
            message: format!("Failed to remove {}: {}", unit_path.display(), e),
        })?;
        self.check(&["daemon-reload"])?;

        info!(service = %name, "Service unregistered");
        Ok(())
    }

    fn start(&self, name: &str) -> DaemonResult<()> {
        debug!(service = %name, "Starting service");
        self.check(&["start", &Self::unit_name(name)])?;
        info!(service = %name, "Service started");
        Ok(())
    }

    fn stop(&self, name: &str) -> DaemonResult<()> {
        debug!(service = %name, "Stopping service");
        self.check(&["stop", &Self::unit_name(name)])?;
        info!(service = %name, "Service stopped");
        Ok(())
    }

    fn query_status(&self, name: &str) -> DaemonResult<ServiceStatus> {
        let result = self.systemctl(&["is-active", &Self::unit_name(name)])?;
        // is-active exits non-zero for anything but "active"; the state word
        // on stdout is what matters.
        let state = result.stdout.trim();
        if state.is_empty() {
            return Err(DaemonError::Control {
                message: result.failure_text(),
            });
        }
        Ok(parse_active_state(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// A fake systemctl: `sh -c <script> systemctl <args...>`.
    fn fake(unit_dir: &std::path::Path, script: &str) -> SystemdControl {
        SystemdControl::new(unit_dir, Duration::from_secs(5)).with_command([
            "sh",
            "-c",
            script,
            "systemctl",
        ])
    }

    #[test]
    fn test_parse_active_state() {
        assert_eq!(parse_active_state("active\n"), ServiceStatus::Running);
        assert_eq!(parse_active_state("activating"), ServiceStatus::StartPending);
        assert_eq!(parse_active_state("deactivating"), ServiceStatus::StopPending);
        assert_eq!(parse_active_state("failed"), ServiceStatus::Stopped);
        assert_eq!(parse_active_state("maintenance"), ServiceStatus::Unknown);
    }

    #[test]
    fn test_render_unit() {
        let unit = render_unit("a1", "", "/opt/servman/bin/servman-host /opt/servman --log.level=info");
        assert!(unit.contains("Description=a1\n"));
        assert!(unit.contains("ExecStart=/opt/servman/bin/servman-host /opt/servman --log.level=info\n"));
        assert!(unit.contains("WantedBy=multi-user.target"));
    }

    #[test]
    fn test_register_writes_unit() {
        let dir = TempDir::new().unwrap();
        let control = fake(dir.path(), "exit 0");

        control.register("a1", "a1", "Worker", "/bin/true").unwrap();

        let unit = fs::read_to_string(dir.path().join("a1.service")).unwrap();
        assert!(unit.contains("Description=Worker"));
    }

    #[test]
    fn test_register_rolls_back_on_enable_failure() {
        let dir = TempDir::new().unwrap();
        let control = fake(
            dir.path(),
            r#"if [ "$1" = enable ]; then echo "Failed to enable unit" >&2; exit 1; fi"#,
        );

        let result = control.register("a1", "a1", "", "/bin/true");
        match result {
            Err(DaemonError::Control { message }) => assert_eq!(message, "Failed to enable unit"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!dir.path().join("a1.service").exists());
    }

    #[test]
    fn test_query_status_reads_state_word() {
        let dir = TempDir::new().unwrap();
        let control = fake(dir.path(), "echo inactive; exit 3");
        assert_eq!(control.query_status("a1").unwrap(), ServiceStatus::Stopped);

        let control = fake(dir.path(), "echo active");
        assert_eq!(control.query_status("a1").unwrap(), ServiceStatus::Running);
    }

    #[test]
    fn test_query_status_without_output_is_error() {
        let dir = TempDir::new().unwrap();
        let control = fake(dir.path(), "echo 'Access denied' >&2; exit 4");
        let result = control.query_status("a1");
        assert!(matches!(result, Err(DaemonError::Control { message }) if message == "Access denied"));
    }

    #[test]
    fn test_stop_surfaces_stderr() {
        let dir = TempDir::new().unwrap();
        let control = fake(dir.path(), "echo 'Unit a1.service not loaded.' >&2; exit 5");
        let result = control.stop("a1");
        assert!(
            matches!(result, Err(DaemonError::Control { message }) if message == "Unit a1.service not loaded.")
        );
    }
}

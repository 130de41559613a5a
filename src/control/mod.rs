//! Lifecycle controller.
//!
//! [`ServiceControl`] is the narrow seam between the registry and the OS
//! service supervisor. The systemd backend drives real units; the memory
//! backend serves dry runs.

mod memory;
mod systemd;
mod traits;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::ControlConfig;
use crate::error::{DaemonError, DaemonResult};

pub use memory::MemoryControl;
pub use systemd::{parse_active_state, render_unit, SystemdControl};
pub use traits::ServiceControl;

/// Build the backend selected in the configuration.
pub fn build_control(config: &ControlConfig) -> DaemonResult<Arc<dyn ServiceControl>> {
    let control: Arc<dyn ServiceControl> = match config.backend.as_str() {
        "systemd" => Arc::new(SystemdControl::new(
            &config.unit_dir,
            Duration::from_secs(config.timeout_seconds),
        )),
        "memory" => Arc::new(MemoryControl::new()),
        other => {
            return Err(DaemonError::Config {
                message: format!("Unknown control backend '{}'", other),
            })
        }
    };

    info!(backend = control.name(), "Lifecycle controller initialized");
    Ok(control)
}

//! Observed state of an OS service.

use std::fmt;

/// Status reported by the service supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceStatus {
    #[default]
    Unknown,
    Stopped,
    StartPending,
    StopPending,
    Running,
}

impl ServiceStatus {
    /// Numeric code exposed to the management plane.
    pub fn code(self) -> i32 {
        match self {
            ServiceStatus::Unknown => 0,
            ServiceStatus::Stopped => 1,
            ServiceStatus::StartPending => 2,
            ServiceStatus::StopPending => 3,
            ServiceStatus::Running => 4,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            ServiceStatus::Unknown => "Unknown",
            ServiceStatus::Stopped => "Stopped",
            ServiceStatus::StartPending => "Starting",
            ServiceStatus::StopPending => "Stopping",
            ServiceStatus::Running => "Running",
        }
    }

    /// Stopped or on its way there.
    pub fn is_stopping_or_stopped(self) -> bool {
        matches!(self, ServiceStatus::Stopped | ServiceStatus::StopPending)
    }

    /// Running or on its way there.
    pub fn is_starting_or_running(self) -> bool {
        matches!(self, ServiceStatus::Running | ServiceStatus::StartPending)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_text() {
        assert_eq!(ServiceStatus::Unknown.code(), 0);
        assert_eq!(ServiceStatus::Running.code(), 4);
        assert_eq!(ServiceStatus::StartPending.text(), "Starting");
        assert_eq!(ServiceStatus::StopPending.to_string(), "Stopping");
    }

    #[test]
    fn test_transition_groups() {
        assert!(ServiceStatus::StopPending.is_stopping_or_stopped());
        assert!(!ServiceStatus::Unknown.is_stopping_or_stopped());
        assert!(ServiceStatus::StartPending.is_starting_or_running());
        assert!(!ServiceStatus::Stopped.is_starting_or_running());
    }
}

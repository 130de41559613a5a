//! Minimal module that logs a heartbeat while it runs.

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info, Span};

use crate::error::DaemonError;

use super::traits::{ManagedService, ServiceContext};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Optional TOML configuration of the heartbeat module.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval_seconds: u64,
    pub message: String,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 1,
            message: "service working".to_string(),
        }
    }
}

#[derive(Default)]
pub struct HeartbeatService {
    config: HeartbeatConfig,
    span: Option<Span>,
    beats: u64,
}

impl HeartbeatService {
    pub fn beats(&self) -> u64 {
        self.beats
    }
}

impl ManagedService for HeartbeatService {
    fn name(&self) -> &'static str {
        "heartbeat"
    }

    fn create(&mut self, ctx: &ServiceContext) -> Result<(), DaemonError> {
        if let Some(path) = &ctx.config_path {
            let content = fs::read_to_string(path)?;
            self.config = toml::from_str(&content).map_err(|e| DaemonError::Config {
                message: format!("{}: {}", path.display(), e),
            })?;
        }
        if self.config.interval_seconds == 0 {
            return Err(DaemonError::Config {
                message: "interval_seconds must be greater than 0".to_string(),
            });
        }
        self.span = Some(ctx.span.clone());
        ctx.span.in_scope(|| debug!(config = ?self.config, "Heartbeat configured"));
        Ok(())
    }

    fn run(&mut self, is_running: &dyn Fn() -> bool) {
        let span = self.span.clone().unwrap_or_else(Span::current);
        let _entered = span.enter();
        let interval = Duration::from_secs(self.config.interval_seconds);
        let mut last = Instant::now();

        info!(text = %self.config.message, beat = self.beats, "Heartbeat");
        while is_running() {
            thread::sleep(POLL_INTERVAL);
            if last.elapsed() >= interval {
                self.beats += 1;
                info!(text = %self.config.message, beat = self.beats, "Heartbeat");
                last = Instant::now();
            }
        }
    }

    fn destroy(&mut self) {
        self.span = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn context(config_path: Option<PathBuf>) -> ServiceContext {
        ServiceContext {
            span: Span::none(),
            root: PathBuf::from("/opt/servman"),
            config_path,
        }
    }

    #[test]
    fn test_create_without_config() {
        let mut service = HeartbeatService::default();
        service.create(&context(None)).unwrap();
        assert_eq!(service.config, HeartbeatConfig::default());
    }

    #[test]
    fn test_create_reads_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beat.toml");
        fs::write(&path, "interval_seconds = 5\nmessage = \"alive\"\n").unwrap();

        let mut service = HeartbeatService::default();
        service.create(&context(Some(path))).unwrap();
        assert_eq!(service.config.interval_seconds, 5);
        assert_eq!(service.config.message, "alive");
    }

    #[test]
    fn test_create_rejects_zero_interval() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beat.toml");
        fs::write(&path, "interval_seconds = 0\n").unwrap();

        let mut service = HeartbeatService::default();
        assert!(service.create(&context(Some(path))).is_err());
    }

    #[test]
    fn test_run_returns_when_stopped() {
        let mut service = HeartbeatService::default();
        service.create(&context(None)).unwrap();

        let polls = Cell::new(0);
        service.run(&|| {
            polls.set(polls.get() + 1);
            polls.get() < 3
        });
        assert_eq!(polls.get(), 3);
        assert_eq!(service.beats(), 0);
        service.destroy();
    }
}

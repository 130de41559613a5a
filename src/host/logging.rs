//! Log sink of the service host.
//!
//! Resolved from the `log.*` parameters before any module code runs.
//! Files go to `<root>/logs/`.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOGS_DIR;
use crate::error::DaemonError;

use super::args::HostArgs;
use super::rotate::RotatingFile;

const DEFAULT_KEEP: usize = 7;
const DEFAULT_SIZE_MIB: u64 = 80;
const MIB: u64 = 1024 * 1024;

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Off,
    /// One file per day, `keep` files retained.
    Daily {
        dir: PathBuf,
        prefix: String,
        suffix: String,
        keep: usize,
    },
    /// One file rotated at `max_bytes`, `keep` archives retained.
    Rotate {
        path: PathBuf,
        max_bytes: u64,
        keep: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSetup {
    pub level: LevelFilter,
    pub sink: LogSink,
}

/// Map a level name to a filter. `fatal` maps to `error`.
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" | "warning" => Some(LevelFilter::WARN),
        "error" | "fatal" => Some(LevelFilter::ERROR),
        "off" => Some(LevelFilter::OFF),
        _ => None,
    }
}

/// Make a log file name safe and give it a `.log` or `.txt` extension.
pub fn sanitize_log_name(name: &str) -> String {
    let mut clean: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    let extension = Path::new(&clean)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    if !matches!(extension.as_deref(), Some("log") | Some("txt")) {
        clean.push_str(".log");
    }
    clean
}

fn positive(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.parse::<u64>().ok()).filter(|n| *n > 0)
}

/// Resolve the sink from host parameters.
pub fn resolve(args: &HostArgs, exe_name: &str) -> LogSetup {
    let level = args
        .get("log.level")
        .and_then(parse_level)
        .unwrap_or(LevelFilter::INFO);
    if level == LevelFilter::OFF {
        return LogSetup {
            level,
            sink: LogSink::Off,
        };
    }

    let name = match args.get("log.name") {
        Some(name) if !name.is_empty() => name,
        _ => exe_name,
    };
    let file_name = sanitize_log_name(name);
    let dir = args.root.join(LOGS_DIR);
    let keep = positive(args.get("log.keep")).map_or(DEFAULT_KEEP, |k| k as usize);

    let sink = match args.get("log.type") {
        Some("daily") | None => {
            let path = Path::new(&file_name);
            LogSink::Daily {
                dir,
                prefix: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default(),
                suffix: path
                    .extension()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default(),
                keep,
            }
        }
        Some(_) => LogSink::Rotate {
            path: dir.join(&file_name),
            max_bytes: positive(args.get("log.size")).unwrap_or(DEFAULT_SIZE_MIB) * MIB,
            keep,
        },
    };

    LogSetup { level, sink }
}

/// Install the global subscriber. Keep the guard alive for the process
/// lifetime so buffered lines are flushed.
pub fn init(setup: &LogSetup) -> Result<Option<WorkerGuard>, DaemonError> {
    let (writer, guard) = match &setup.sink {
        LogSink::Off => return Ok(None),
        LogSink::Daily {
            dir,
            prefix,
            suffix,
            keep,
        } => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(prefix)
                .filename_suffix(suffix)
                .max_log_files(*keep)
                .build(dir)
                .map_err(|e| DaemonError::Host {
                    message: format!("Failed to open log directory {}: {}", dir.display(), e),
                })?;
            tracing_appender::non_blocking(appender)
        }
        LogSink::Rotate {
            path,
            max_bytes,
            keep,
        } => {
            let file = RotatingFile::open(path, *max_bytes, *keep).map_err(|e| DaemonError::Host {
                message: format!("Failed to open log file {}: {}", path.display(), e),
            })?;
            tracing_appender::non_blocking(file)
        }
    };

    tracing_subscriber::registry()
        .with(setup.level)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init()
        .map_err(|e| DaemonError::Host {
            message: format!("Failed to install log subscriber: {}", e),
        })?;

    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(params: &[&str]) -> HostArgs {
        let mut all = vec!["/opt/servman".to_string()];
        all.extend(params.iter().map(|p| p.to_string()));
        HostArgs::parse(all).unwrap()
    }

    #[test]
    fn test_sanitize_log_name() {
        assert_eq!(sanitize_log_name("worker"), "worker.log");
        assert_eq!(sanitize_log_name("worker.txt"), "worker.txt");
        assert_eq!(sanitize_log_name("my svc/1.LOG"), "my-svc-1.LOG");
        assert_eq!(sanitize_log_name("app.out"), "app.out.log");
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("fatal"), Some(LevelFilter::ERROR));
        assert_eq!(parse_level("DEBUG"), Some(LevelFilter::DEBUG));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_daily_defaults() {
        let setup = resolve(&args(&[]), "servman-host");
        assert_eq!(setup.level, LevelFilter::INFO);
        assert_eq!(
            setup.sink,
            LogSink::Daily {
                dir: PathBuf::from("/opt/servman/logs"),
                prefix: "servman-host".to_string(),
                suffix: "log".to_string(),
                keep: 7,
            }
        );
    }

    #[test]
    fn test_rotate_sink() {
        let setup = resolve(
            &args(&["--log.type=rotate", "--log.size=2", "--log.keep=3", "--log.name=worker"]),
            "servman-host",
        );
        assert_eq!(
            setup.sink,
            LogSink::Rotate {
                path: PathBuf::from("/opt/servman/logs/worker.log"),
                max_bytes: 2 * MIB,
                keep: 3,
            }
        );
    }

    #[test]
    fn test_rotate_invalid_numbers_fall_back() {
        let setup = resolve(
            &args(&["--log.type=rotate", "--log.size=0", "--log.keep=abc"]),
            "host",
        );
        match setup.sink {
            LogSink::Rotate { max_bytes, keep, .. } => {
                assert_eq!(max_bytes, 80 * MIB);
                assert_eq!(keep, 7);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_off_level_disables_sink() {
        let setup = resolve(&args(&["--log.level=off"]), "host");
        assert_eq!(setup.sink, LogSink::Off);
    }
}

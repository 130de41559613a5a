use tracing::trace;

use crate::error::{DaemonError, DaemonResult, ValidationErrorKind};
use crate::model::{Instance, LibraryRef, LogSpec, LogType};

use super::{LOG_KEEP, LOG_LEVEL, LOG_NAME, LOG_SIZE, LOG_TYPE, SERVICE_CONFIG};

/// Apply an option line to an instance.
pub fn parse(options: &str, instance: &mut Instance) -> DaemonResult<()> {
    parse_into(options, &mut instance.library, &mut instance.log)
}

/// Apply an option line to a library/log pair.
///
/// Tokens are applied in order. On an invalid numeric value the call fails
/// and the offending field keeps its old value, but fields set by earlier
/// tokens stay set.
pub fn parse_into(options: &str, library: &mut LibraryRef, log: &mut LogSpec) -> DaemonResult<()> {
    for token in options.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };

        match key {
            SERVICE_CONFIG => library.config = value.to_string(),
            LOG_NAME => log.name = value.to_string(),
            LOG_LEVEL => log.level = value.to_string(),
            LOG_TYPE => {
                log.kind = LogType::parse(value).ok_or_else(|| DaemonError::Validation {
                    kind: ValidationErrorKind::InvalidLogType {
                        value: value.to_string(),
                    },
                })?;
            }
            LOG_SIZE => {
                log.size = positive(value).ok_or(DaemonError::Validation {
                    kind: ValidationErrorKind::InvalidLogSize,
                })?;
            }
            LOG_KEEP => {
                log.keep = positive(value).ok_or(DaemonError::Validation {
                    kind: ValidationErrorKind::InvalidLogKeep,
                })?;
            }
            _ => trace!(option = %key, "Ignoring option"),
        }
    }

    Ok(())
}

fn positive(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceStatus;

    fn instance() -> Instance {
        Instance {
            id: "svcA".to_string(),
            name: "a1".to_string(),
            description: String::new(),
            library: LibraryRef::default(),
            log: LogSpec::default(),
            status: ServiceStatus::Unknown,
        }
    }

    #[test]
    fn test_zero_keep_rejected_and_unchanged() {
        let mut inst = instance();
        let result = parse("--log.keep=0", &mut inst);
        assert!(matches!(
            result,
            Err(DaemonError::Validation {
                kind: ValidationErrorKind::InvalidLogKeep
            })
        ));
        assert_eq!(inst.log.keep, 7);
    }

    #[test]
    fn test_keep_and_type_applied() {
        let mut inst = instance();
        parse("--log.keep=30 --log.type=rotate", &mut inst).unwrap();
        assert_eq!(inst.log.keep, 30);
        assert_eq!(inst.log.kind, LogType::Rotate);
    }

    #[test]
    fn test_earlier_tokens_survive_failure() {
        let mut inst = instance();
        let result = parse("--log.level=debug --log.size=abc --log.keep=9", &mut inst);
        assert!(matches!(
            result,
            Err(DaemonError::Validation {
                kind: ValidationErrorKind::InvalidLogSize
            })
        ));
        assert_eq!(inst.log.level, "debug");
        assert_eq!(inst.log.size, 7);
        assert_eq!(inst.log.keep, 7);
    }

    #[test]
    fn test_unknown_and_malformed_tokens_ignored() {
        let mut inst = instance();
        parse(
            "--service.lib=other.so --unknown=1 bare --log.name=svc.log",
            &mut inst,
        )
        .unwrap();
        assert_eq!(inst.library.name, "");
        assert_eq!(inst.log.name, "svc.log");
    }

    #[test]
    fn test_config_override() {
        let mut inst = instance();
        parse("  --service.config=a1.toml\t--log.level=warn ", &mut inst).unwrap();
        assert_eq!(inst.library.config, "a1.toml");
        assert_eq!(inst.log.level, "warn");
    }

    #[test]
    fn test_invalid_log_type() {
        let mut inst = instance();
        let result = parse("--log.type=hourly", &mut inst);
        assert!(matches!(
            result,
            Err(DaemonError::Validation {
                kind: ValidationErrorKind::InvalidLogType { .. }
            })
        ));
        assert_eq!(inst.log.kind, LogType::Daily);
    }
}

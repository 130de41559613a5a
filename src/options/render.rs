use crate::config::{CONF_DIR, DEFINITIONS_DIR};
use crate::model::{Instance, DEFAULT_LOG_LEVEL};

use super::{
    LOG_KEEP, LOG_LEVEL, LOG_NAME, LOG_SIZE, LOG_TYPE, RENDER_DEFAULT_KEEP, RENDER_DEFAULT_SIZE,
    SERVICE_CONFIG, SERVICE_LIB,
};

/// Render the option line of an instance.
///
/// With `for_registration` the module selector and a root-relative
/// configuration path are emitted, as needed on the OS command line.
/// Otherwise only the bare configuration name is emitted.
pub fn render(instance: &Instance, for_registration: bool) -> String {
    let mut tokens = Vec::with_capacity(7);

    if for_registration {
        tokens.push(format!(
            "{}={}/{}/{}",
            SERVICE_LIB, DEFINITIONS_DIR, instance.id, instance.library.name
        ));
        tokens.push(format!(
            "{}={}/{}",
            SERVICE_CONFIG, CONF_DIR, instance.library.config
        ));
    } else {
        tokens.push(format!("{}={}", SERVICE_CONFIG, instance.library.config));
    }

    let log = &instance.log;
    if !log.name.is_empty() {
        tokens.push(format!("{}={}", LOG_NAME, log.name));
    }
    tokens.push(format!("{}={}", LOG_TYPE, log.kind.as_str()));

    let level = if log.level.is_empty() {
        DEFAULT_LOG_LEVEL
    } else {
        log.level.as_str()
    };
    tokens.push(format!("{}={}", LOG_LEVEL, level));

    let keep = if log.keep > 0 { log.keep } else { RENDER_DEFAULT_KEEP };
    tokens.push(format!("{}={}", LOG_KEEP, keep));

    let size = if log.size > 0 { log.size } else { RENDER_DEFAULT_SIZE };
    tokens.push(format!("{}={}", LOG_SIZE, size));

    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LibraryRef, LogSpec, LogType, ServiceStatus};

    fn instance() -> Instance {
        Instance {
            id: "svcA".to_string(),
            name: "a1".to_string(),
            description: String::new(),
            library: LibraryRef {
                name: "svcA.so".to_string(),
                config: "a1.toml".to_string(),
                version: "1.0".to_string(),
            },
            log: LogSpec::default(),
            status: ServiceStatus::Unknown,
        }
    }

    fn count_prefix(line: &str, prefix: &str) -> usize {
        line.split_whitespace()
            .filter(|t| t.starts_with(prefix))
            .count()
    }

    #[test]
    fn test_render_for_registration() {
        let line = render(&instance(), true);
        assert_eq!(count_prefix(&line, "--service.lib="), 1);
        assert_eq!(count_prefix(&line, "--service.config="), 1);
        assert!(line.contains("--service.lib=services/svcA/svcA.so"));
        assert!(line.contains("--service.config=conf/a1.toml"));
    }

    #[test]
    fn test_render_for_display() {
        let line = render(&instance(), false);
        assert_eq!(count_prefix(&line, "--service.lib="), 0);
        assert_eq!(count_prefix(&line, "--service.config="), 1);
        assert!(line.starts_with("--service.config=a1.toml "));
    }

    #[test]
    fn test_render_substitutes_defaults() {
        let mut inst = instance();
        inst.log = LogSpec {
            name: String::new(),
            kind: LogType::Rotate,
            level: String::new(),
            keep: 0,
            size: -1,
        };

        let line = render(&inst, false);
        assert!(!line.contains("--log.name"));
        assert!(line.contains("--log.type=rotate"));
        assert!(line.contains("--log.level=info"));
        assert!(line.contains("--log.keep=7"));
        assert!(line.contains("--log.size=80"));
    }

    #[test]
    fn test_render_keeps_stored_values() {
        let mut inst = instance();
        inst.log.name = "worker.log".to_string();
        inst.log.keep = 30;
        inst.log.size = 7;

        let line = render(&inst, false);
        assert!(line.contains("--log.name=worker.log"));
        assert!(line.contains("--log.keep=30"));
        assert!(line.contains("--log.size=7"));
    }
}

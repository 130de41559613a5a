//! Instance persistence.
//!
//! Instances live in a single JSON document, `{ "services": [...] }`,
//! rewritten in full after every change.

use std::fs;
use std::io;
use std::path::Path;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{DaemonError, DaemonResult};
use crate::model::{Instance, LibraryRef, ServiceStatus, UNKNOWN_VERSION};
use crate::storage::write_atomic;
use crate::validation::validate_instance_name;

use super::definitions::parse_log_spec;
use super::fields::Fields;

/// Renderer default, used when a stored record has no explicit size.
const STORED_DEFAULT_SIZE: i64 = crate::options::RENDER_DEFAULT_SIZE;

/// Load persisted instances.
///
/// A missing file or an empty document yields no instances. A document
/// with the wrong shape is an error; a single bad record is skipped.
pub fn load_instances(path: &Path) -> DaemonResult<Vec<Instance>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No services file, starting empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document: Value = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
    let object = match &document {
        Value::Null => return Ok(Vec::new()),
        Value::Object(object) if object.is_empty() => return Ok(Vec::new()),
        Value::Object(object) => object,
        _ => return Err(invalid("document is not an object")),
    };

    let records = object
        .get("services")
        .ok_or_else(|| invalid("missing \"services\""))?
        .as_array()
        .ok_or_else(|| invalid("\"services\" is not an array"))?;

    let mut instances: Vec<Instance> = Vec::with_capacity(records.len());
    for (position, record) in records.iter().enumerate() {
        let fields = Fields::new(record, "services[]").map_err(|_| {
            invalid(format!("services[{}] is not an object", position))
        })?;
        if fields.is_empty() {
            continue;
        }

        match parse_instance(&fields) {
            Ok(instance) if instances.iter().any(|i| i.name == instance.name) => {
                warn!(position, service = %instance.name, "Skipping duplicate service record");
            }
            Ok(instance) => instances.push(instance),
            Err(e) => warn!(position, error = %e, "Skipping invalid service record"),
        }
    }

    info!(count = instances.len(), path = %path.display(), "Service instances loaded");
    Ok(instances)
}

fn invalid(message: impl Into<String>) -> DaemonError {
    DaemonError::InvalidServicesFile {
        message: message.into(),
    }
}

/// Build an instance from one persisted record.
///
/// `library` is either `{name|path, configuration, version}` or a bare
/// string with `configuration`/`version` beside it.
fn parse_instance(fields: &Fields<'_>) -> DaemonResult<Instance> {
    let id = fields.require_string("id")?;
    if id.is_empty() {
        return Err(DaemonError::invalid_parameter("id", "must not be empty"));
    }

    let name = fields.require_string("name")?.trim();
    validate_instance_name(name)?;

    let description = fields.optional_string("description")?.unwrap_or_default();

    let (library, config, version) = match fields.raw("library") {
        Some(Value::String(_)) => (
            fields.require_string("library")?,
            fields.optional_string("configuration")?,
            fields.optional_string("version")?,
        ),
        _ => {
            let library = fields.require_object("library", "library.")?;
            let name = match library.optional_string("name")? {
                Some(name) => name,
                None => library.require_string("path")?,
            };
            (
                name,
                library.optional_string("configuration")?,
                library.optional_string("version")?,
            )
        }
    };
    if library.is_empty() {
        return Err(DaemonError::invalid_parameter("library", "must not be empty"));
    }

    let version = match version {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN_VERSION.to_string(),
    };

    let log = parse_log_spec(&fields.require_object("log", "log.")?, STORED_DEFAULT_SIZE)?;

    Ok(Instance {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        library: LibraryRef {
            name: library.to_string(),
            config: config.unwrap_or_default().to_string(),
            version,
        },
        log,
        status: ServiceStatus::Unknown,
    })
}

/// Persisted form of one instance.
fn record(instance: &Instance) -> Value {
    json!({
        "id": instance.id,
        "name": instance.name,
        "description": instance.description,
        "library": instance.library,
        "log": instance.log,
    })
}

/// Rewrite the services file from `instances`.
pub fn persist_instances(instances: &[Instance], path: &Path) -> DaemonResult<()> {
    let document = if instances.is_empty() {
        json!({})
    } else {
        json!({ "services": instances.iter().map(record).collect::<Vec<_>>() })
    };

    let content = serde_json::to_vec_pretty(&document)?;
    write_atomic(path, &content).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Failed to persist services");
        DaemonError::Io(e)
    })?;

    debug!(count = instances.len(), path = %path.display(), "Services persisted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogSpec, LogType};
    use tempfile::TempDir;

    fn sample(name: &str) -> Instance {
        Instance {
            id: "svcA".to_string(),
            name: name.to_string(),
            description: "worker".to_string(),
            library: LibraryRef {
                name: "svcA.so".to_string(),
                config: format!("{}.toml", name),
                version: "1.0".to_string(),
            },
            log: LogSpec {
                name: String::new(),
                kind: LogType::Rotate,
                level: "debug".to_string(),
                keep: 3,
                size: 12,
            },
            status: ServiceStatus::Running,
        }
    }

    #[test]
    fn test_missing_and_empty_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("services.json");
        assert!(load_instances(&path).unwrap().is_empty());

        for content in ["", "null", "{}"] {
            fs::write(&path, content).unwrap();
            assert!(load_instances(&path).unwrap().is_empty(), "content {:?}", content);
        }
    }

    #[test]
    fn test_malformed_shape_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("services.json");

        for content in [
            "[]",
            r#"{"other": 1}"#,
            r#"{"services": {}}"#,
            r#"{"services": ["a1"]}"#,
            "{broken",
        ] {
            fs::write(&path, content).unwrap();
            assert!(
                matches!(
                    load_instances(&path),
                    Err(DaemonError::InvalidServicesFile { .. })
                ),
                "content {:?}",
                content
            );
        }
    }

    #[test]
    fn test_invalid_records_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("services.json");
        let document = json!({"services": [
            {},
            {"id": "svcA", "name": "good", "library": {"name": "svcA.so", "configuration": "good.toml", "version": ""}, "log": {"type": "daily"}},
            {"id": "svcA", "name": "", "library": {"name": "svcA.so"}, "log": {"type": "daily"}},
            {"id": "svcA", "name": "nolog", "library": {"name": "svcA.so"}},
            {"id": "svcB", "name": "legacy", "library": "svcB.so", "configuration": "legacy.toml", "version": "0.9", "log": {"type": "rotate"}},
            {"id": "svcA", "name": "pathform", "library": {"path": "svcA.so"}, "log": {"type": "daily"}}
        ]});
        fs::write(&path, document.to_string()).unwrap();

        let instances = load_instances(&path).unwrap();
        let names: Vec<_> = instances.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["good", "legacy", "pathform"]);

        assert_eq!(instances[0].library.version, "unknown");
        assert_eq!(instances[0].log.size, 80);
        assert_eq!(instances[1].library.config, "legacy.toml");
        assert_eq!(instances[1].log.kind, LogType::Rotate);
        assert!(instances.iter().all(|i| i.status == ServiceStatus::Unknown));
    }

    #[test]
    fn test_persist_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("services.json");

        persist_instances(&[sample("a1"), sample("a2")], &path).unwrap();
        let document: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["services"][0]["library"]["configuration"], "a1.toml");
        assert_eq!(document["services"][0]["log"]["type"], "rotate");
        assert!(document["services"][0].get("status").is_none());

        let loaded = load_instances(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].log.keep, 3);
        assert_eq!(loaded[1].status, ServiceStatus::Unknown);
    }

    #[test]
    fn test_persist_empty_omits_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("services.json");
        persist_instances(&[], &path).unwrap();

        let document: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document, json!({}));
    }
}

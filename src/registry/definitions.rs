//! Definition discovery.
//!
//! Each immediate subdirectory of the definitions root is a candidate
//! definition described by a `prototype.json` manifest. A bad or missing
//! manifest skips that directory only.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{DaemonError, DaemonResult, ValidationErrorKind};
use crate::model::{
    Definition, LibraryRef, LogSpec, LogType, DEFAULT_LOG_KEEP, DEFAULT_LOG_LEVEL,
    DEFAULT_LOG_SIZE, UNKNOWN_VERSION,
};

use super::fields::Fields;

/// Manifest file name inside each definition directory.
pub const MANIFEST_FILE: &str = "prototype.json";

/// Scan `dir` for definitions, sorted by id.
///
/// `manager_id` names the manager's own directory, which is never a
/// definition. `module_suffix` completes the default module file name.
pub fn load_definitions(dir: &Path, manager_id: &str, module_suffix: &str) -> Vec<Definition> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Definitions directory unavailable");
            return Vec::new();
        }
    };

    let mut definitions = Vec::new();
    for entry in entries.flatten() {
        let id = entry.file_name().to_string_lossy().to_string();
        if id.starts_with('.') || id == manager_id {
            continue;
        }
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }

        let manifest = entry.path().join(MANIFEST_FILE);
        if !manifest.is_file() {
            warn!(definition = %id, "Service definition has no {}", MANIFEST_FILE);
            continue;
        }

        match read_manifest(&manifest).and_then(|v| parse_manifest(&id, &v, module_suffix)) {
            Ok(definition) => {
                debug!(definition = %id, name = %definition.name, "Loaded service definition");
                definitions.push(definition);
            }
            Err(e) => warn!(definition = %id, error = %e, "Skipping invalid service definition"),
        }
    }

    definitions.sort_by(|a, b| a.id.cmp(&b.id));
    info!(
        count = definitions.len(),
        dir = %dir.display(),
        "Service definitions loaded"
    );
    definitions
}

fn read_manifest(path: &Path) -> DaemonResult<Value> {
    let content = fs::read(path)?;
    Ok(serde_json::from_slice(&content)?)
}

/// Build a definition from its manifest.
pub fn parse_manifest(id: &str, manifest: &Value, module_suffix: &str) -> DaemonResult<Definition> {
    let fields = Fields::new(manifest, MANIFEST_FILE)?;

    let name = fields.require_string("name")?.trim();
    if name.is_empty() {
        return Err(DaemonError::invalid_parameter("name", "must not be empty"));
    }

    let description = fields.optional_string("description")?.unwrap_or_default();

    let library = match fields.optional_string("library")? {
        Some("") => return Err(DaemonError::invalid_parameter("library", "must not be empty")),
        Some(library) => library.to_string(),
        None => format!("{}{}", id, module_suffix),
    };

    let config = fields.optional_string("configuration")?.unwrap_or_default();

    let version = match fields.optional_string("version")? {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN_VERSION.to_string(),
    };

    let log = parse_log_spec(&fields.require_object("log", "log.")?, DEFAULT_LOG_SIZE)?;

    Ok(Definition {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        library: LibraryRef {
            name: library,
            config: config.to_string(),
            version,
        },
        log,
    })
}

/// Parse a `log` object. `type` is required; the rest fall back to defaults.
pub(super) fn parse_log_spec(log: &Fields<'_>, default_size: i64) -> DaemonResult<LogSpec> {
    let kind = log.require_string("type")?;
    let kind = LogType::parse(kind).ok_or_else(|| DaemonError::Validation {
        kind: ValidationErrorKind::InvalidLogType {
            value: kind.to_string(),
        },
    })?;

    let level = match log.optional_string("level")? {
        Some(level) if !level.is_empty() => level.to_string(),
        _ => DEFAULT_LOG_LEVEL.to_string(),
    };

    Ok(LogSpec {
        name: log.optional_string("name")?.unwrap_or_default().to_string(),
        kind,
        level,
        keep: log.optional_i64("keep")?.unwrap_or(DEFAULT_LOG_KEEP),
        size: log.optional_i64("size")?.unwrap_or(default_size),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_manifest(root: &Path, id: &str, manifest: &Value) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), manifest.to_string()).unwrap();
    }

    #[test]
    fn test_defaults_applied() {
        let manifest = json!({"name": "  Service A  ", "log": {"type": "daily"}});
        let definition = parse_manifest("svcA", &manifest, ".so").unwrap();

        assert_eq!(definition.name, "Service A");
        assert_eq!(definition.library.name, "svcA.so");
        assert_eq!(definition.library.version, "unknown");
        assert_eq!(definition.log.level, "info");
        assert_eq!(definition.log.keep, 7);
        assert_eq!(definition.log.size, 7);
    }

    #[test]
    fn test_explicit_fields() {
        let manifest = json!({
            "name": "Worker",
            "description": "Background worker",
            "library": "worker.so",
            "configuration": "worker.toml",
            "version": "2.1.0",
            "log": {"name": "worker.log", "type": "rotate", "level": "debug", "keep": 3, "size": 20}
        });
        let definition = parse_manifest("worker", &manifest, ".so").unwrap();

        assert_eq!(definition.description, "Background worker");
        assert_eq!(definition.library.config, "worker.toml");
        assert_eq!(definition.library.version, "2.1.0");
        assert_eq!(definition.log.kind, LogType::Rotate);
        assert_eq!(definition.log.size, 20);
    }

    #[test]
    fn test_invalid_manifests() {
        let blank_name = json!({"name": "   ", "log": {"type": "daily"}});
        assert!(parse_manifest("a", &blank_name, ".so").is_err());

        let empty_library = json!({"name": "A", "library": "", "log": {"type": "daily"}});
        assert!(parse_manifest("a", &empty_library, ".so").is_err());

        let missing_log_type = json!({"name": "A", "log": {}});
        assert!(parse_manifest("a", &missing_log_type, ".so").is_err());

        let bad_description = json!({"name": "A", "description": 5, "log": {"type": "daily"}});
        assert!(parse_manifest("a", &bad_description, ".so").is_err());
    }

    #[test]
    fn test_scan_skips_bad_entries() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        write_manifest(root, "svcB", &json!({"name": "B", "log": {"type": "daily"}}));
        write_manifest(root, "svcA", &json!({"name": "A", "log": {"type": "rotate"}}));
        write_manifest(root, "empty", &json!({"name": "", "log": {"type": "daily"}}));
        write_manifest(root, "servman", &json!({"name": "Manager", "log": {"type": "daily"}}));
        write_manifest(root, ".hidden", &json!({"name": "H", "log": {"type": "daily"}}));
        fs::create_dir_all(root.join("no-manifest")).unwrap();
        fs::write(root.join("stray.txt"), "x").unwrap();
        fs::create_dir_all(root.join("broken")).unwrap();
        fs::write(root.join("broken").join(MANIFEST_FILE), "{not json").unwrap();

        let definitions = load_definitions(root, "servman", ".so");
        let ids: Vec<_> = definitions.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["svcA", "svcB"]);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(load_definitions(&dir.path().join("nope"), "servman", ".so").is_empty());
    }
}

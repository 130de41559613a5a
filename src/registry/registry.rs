//! Definition and instance registry.

use std::fs;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::Layout;
use crate::control::ServiceControl;
use crate::error::{ConflictKind, DaemonError, DaemonResult, NotFoundKind, ValidationErrorKind};
use crate::model::{Definition, Instance, ServiceStatus};
use crate::options;
use crate::storage::{remove_if_exists, write_atomic};
use crate::validation::{validate_instance_name, validate_relative_path};

use super::definitions::load_definitions;
use super::instances::{load_instances, persist_instances};

/// Which collection an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Definition,
    Service,
}

impl Target {
    pub fn parse(value: &str) -> DaemonResult<Self> {
        match value {
            "definition" => Ok(Target::Definition),
            "service" => Ok(Target::Service),
            other => Err(DaemonError::Validation {
                kind: ValidationErrorKind::UnknownTarget {
                    target: other.to_string(),
                },
            }),
        }
    }
}

/// Lifecycle request for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
}

impl Action {
    /// Parse an action name, ignoring case.
    pub fn parse(value: &str) -> DaemonResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            _ => Err(DaemonError::Validation {
                kind: ValidationErrorKind::UnknownAction {
                    action: value.to_string(),
                },
            }),
        }
    }
}

/// Owns definitions and instances and enforces their invariants.
pub struct Registry {
    layout: Layout,
    definitions: Vec<Definition>,
    instances: Vec<Instance>,
    control: Arc<dyn ServiceControl>,
}

impl Registry {
    /// Load definitions and persisted instances from `layout`.
    ///
    /// A malformed services file aborts construction.
    pub fn load(layout: Layout, control: Arc<dyn ServiceControl>) -> DaemonResult<Self> {
        let definitions = load_definitions(
            &layout.definitions_dir,
            &layout.manager_id,
            &layout.module_suffix,
        );
        let instances = load_instances(&layout.services_file)?;
        Ok(Self::new(layout, definitions, instances, control))
    }

    pub fn new(
        layout: Layout,
        definitions: Vec<Definition>,
        instances: Vec<Instance>,
        control: Arc<dyn ServiceControl>,
    ) -> Self {
        Self {
            layout,
            definitions,
            instances,
            control,
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn control(&self) -> &dyn ServiceControl {
        self.control.as_ref()
    }

    pub fn definition(&self, id: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name == name)
    }

    fn definition_or_not_found(&self, id: &str) -> DaemonResult<&Definition> {
        self.definition(id).ok_or_else(|| DaemonError::NotFound {
            kind: NotFoundKind::Definition { id: id.to_string() },
        })
    }

    fn instance_or_not_found(&self, name: &str) -> DaemonResult<&Instance> {
        self.instance(name).ok_or_else(|| service_not_found(name))
    }

    /// All instances with their live status.
    pub fn list_instances(&self) -> Vec<Value> {
        self.instances
            .iter()
            .map(|instance| {
                let mut item = summary(
                    &instance.id,
                    &instance.name,
                    &instance.description,
                    &instance.library,
                    &instance.log,
                );
                attach_status(&mut item, self.control.query_status(&instance.name));
                item
            })
            .collect()
    }

    /// All definitions.
    pub fn list_definitions(&self) -> Vec<Value> {
        self.definitions
            .iter()
            .map(|d| summary(&d.id, &d.name, &d.description, &d.library, &d.log))
            .collect()
    }

    /// Detail view of a definition (by id) or instance (by name).
    pub fn get_detail(&self, target: Target, index: &str) -> DaemonResult<Value> {
        match target {
            Target::Definition => {
                let definition = self.definition_or_not_found(index)?;
                let preview = definition.instantiate(&definition.id);
                let path = self
                    .layout
                    .definition_config_path(&definition.id, &definition.library.config);
                Ok(detail(&preview, &definition.name, read_config(&definition.library.config, &path)))
            }
            Target::Service => {
                let instance = self.instance_or_not_found(index)?;
                let path = self.layout.instance_config_path(&instance.library.config);
                let mut item = detail(instance, &instance.name, read_config(&instance.library.config, &path));
                attach_status(&mut item, self.control.query_status(&instance.name));
                Ok(item)
            }
        }
    }

    /// Update cached metadata of a definition or instance.
    ///
    /// Instances also get their configuration file rewritten and the
    /// services file persisted. OS registration is never touched.
    pub fn set_detail(
        &mut self,
        target: Target,
        index: &str,
        option: &str,
        configuration: &str,
    ) -> DaemonResult<()> {
        match target {
            Target::Definition => {
                let position = self
                    .definitions
                    .iter()
                    .position(|d| d.id == index)
                    .ok_or_else(|| DaemonError::NotFound {
                        kind: NotFoundKind::Definition {
                            id: index.to_string(),
                        },
                    })?;
                let mut working = self.definitions[position].clone();
                options::parse_into(option, &mut working.library, &mut working.log)?;
                self.definitions[position] = working;
                info!(definition = %index, "Definition defaults updated");
                Ok(())
            }
            Target::Service => {
                let position = self
                    .instances
                    .iter()
                    .position(|i| i.name == index)
                    .ok_or_else(|| service_not_found(index))?;
                let mut working = self.instances[position].clone();
                options::parse(option, &mut working)?;
                self.write_config(&working, configuration)?;
                self.instances[position] = working;
                persist_instances(&self.instances, &self.layout.services_file)?;
                info!(service = %index, "Service detail updated");
                Ok(())
            }
        }
    }

    /// Create and register a new instance of a definition.
    pub fn create(
        &mut self,
        definition_id: &str,
        name: &str,
        option: &str,
        configuration: &str,
    ) -> DaemonResult<Instance> {
        let definition = self.definition_or_not_found(definition_id)?;

        validate_instance_name(name)?;
        if self.instance(name).is_some() {
            return Err(DaemonError::Conflict {
                kind: ConflictKind::AlreadyExists {
                    name: name.to_string(),
                },
            });
        }

        let mut instance = definition.instantiate(name);
        options::parse(option, &mut instance)?;
        let written = self.write_config(&instance, configuration)?;

        let command_line = self.command_line(&instance);
        debug!(service = %name, command = %command_line, "Registering service");
        if let Err(e) = self.control.register(
            &instance.name,
            &instance.name,
            &instance.description,
            &command_line,
        ) {
            warn!(service = %name, error = %e, "Service registration failed");
            if let Some(path) = written {
                let _ = remove_if_exists(&path);
            }
            return Err(e);
        }

        self.instances.push(instance.clone());
        if let Err(e) = persist_instances(&self.instances, &self.layout.services_file) {
            warn!(service = %name, error = %e, "Service record not persisted, rolling back");
            self.instances.pop();
            if let Err(rollback) = self.control.unregister(name) {
                error!(service = %name, error = %rollback, "Rollback of registration failed");
            }
            if let Some(path) = written {
                let _ = remove_if_exists(&path);
            }
            return Err(e);
        }

        info!(service = %name, definition = %definition_id, "Service created");
        Ok(instance)
    }

    /// Unregister and forget a stopped instance.
    ///
    /// The remaining records are written before the OS registration is
    /// dropped, so a failed write leaves the instance fully in place.
    pub fn delete(&mut self, name: &str) -> DaemonResult<()> {
        let config = self.instance_or_not_found(name)?.library.config.clone();

        let status = self.control.query_status(name)?;
        if status != ServiceStatus::Stopped {
            return Err(DaemonError::Conflict {
                kind: ConflictKind::NotStopped {
                    status: status.text().to_string(),
                },
            });
        }

        let remaining: Vec<Instance> = self
            .instances
            .iter()
            .filter(|i| i.name != name)
            .cloned()
            .collect();
        persist_instances(&remaining, &self.layout.services_file)?;

        if let Err(e) = self.control.unregister(name) {
            warn!(service = %name, error = %e, "Unregister failed, restoring service record");
            if let Err(restore) = persist_instances(&self.instances, &self.layout.services_file) {
                error!(service = %name, error = %restore, "Services file no longer lists a registered service");
            }
            return Err(e);
        }

        if !config.is_empty() {
            let path = self.layout.instance_config_path(&config);
            if let Err(e) = remove_if_exists(&path) {
                warn!(service = %name, path = %path.display(), error = %e, "Configuration not removed");
            }
        }

        self.instances = remaining;

        info!(service = %name, "Service deleted");
        Ok(())
    }

    /// Start or stop an instance.
    pub fn control_instance(&self, name: &str, action: Action) -> DaemonResult<()> {
        self.instance_or_not_found(name)?;
        match action {
            Action::Start => self.control.start(name),
            Action::Stop => self.control.stop(name),
        }
    }

    /// OS command line for an instance.
    pub fn command_line(&self, instance: &Instance) -> String {
        format!(
            "{} {} {}",
            quote(&self.layout.host_binary.to_string_lossy()),
            quote(&self.layout.root.to_string_lossy()),
            options::render(instance, true)
        )
    }

    /// Write an instance's configuration file. Returns the path written.
    fn write_config(
        &self,
        instance: &Instance,
        configuration: &str,
    ) -> DaemonResult<Option<std::path::PathBuf>> {
        let config = &instance.library.config;
        if config.is_empty() {
            return Ok(None);
        }

        let relative = validate_relative_path(config)?;
        let path = self.layout.conf_dir.join(relative);
        write_atomic(&path, configuration.as_bytes()).map_err(|source| {
            warn!(path = %path.display(), error = %source, "Configuration write failed");
            DaemonError::ConfigurationWrite {
                config: config.clone(),
                source,
            }
        })?;
        Ok(Some(path))
    }
}

fn service_not_found(name: &str) -> DaemonError {
    DaemonError::NotFound {
        kind: NotFoundKind::Service {
            name: name.to_string(),
        },
    }
}

fn summary(
    id: &str,
    name: &str,
    description: &str,
    library: &crate::model::LibraryRef,
    log: &crate::model::LogSpec,
) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": description,
        "library": {
            "path": library.name,
            "configuration": library.config,
            "version": library.version,
        },
        "log": log,
    })
}

fn detail(instance: &Instance, name: &str, configuration: String) -> Value {
    json!({
        "id": instance.id,
        "name": name,
        "description": instance.description,
        "library": instance.library,
        "option": options::render(instance, false),
        "configuration": configuration,
    })
}

fn attach_status(item: &mut Value, status: DaemonResult<ServiceStatus>) {
    let (code, text) = match status {
        Ok(status) => (status.code(), status.text().to_string()),
        Err(e) => (ServiceStatus::Unknown.code(), e.to_string()),
    };
    item["status_code"] = json!(code);
    item["status_txt"] = json!(text);
}

fn read_config(config: &str, path: &std::path::Path) -> String {
    if config.is_empty() {
        return String::new();
    }
    fs::read_to_string(path).unwrap_or_default()
}

fn quote(arg: &str) -> String {
    if arg.chars().any(char::is_whitespace) {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    }
}

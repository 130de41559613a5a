//! Endpoint handlers.
//!
//! Registry work is synchronous and runs on the blocking pool. Malformed
//! form bodies are answered with `code: -1`, never a bare HTTP error.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::FormRejection;
use axum::extract::{Multipart, State};
use axum::Form;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DaemonError, DaemonResult, PackageErrorKind, ValidationErrorKind};
use crate::manager::Manager;
use crate::registry::{Action, Target};

use super::response::ApiResponse;

const SUCCESS: &str = "success";

/// Form fields shared by all endpoints. Absent fields are empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceForm {
    #[serde(rename = "type")]
    pub target: String,
    pub index: String,
    pub name: String,
    pub option: String,
    pub configuration: String,
    pub action: String,
}

fn required<'a>(param: &str, value: &'a str) -> DaemonResult<&'a str> {
    if value.is_empty() {
        Err(DaemonError::missing_parameter(param))
    } else {
        Ok(value)
    }
}

fn expect_target(value: &str, expected: Target) -> DaemonResult<Target> {
    match Target::parse(value)? {
        target if target == expected => Ok(target),
        _ => Err(DaemonError::Validation {
            kind: ValidationErrorKind::UnknownTarget {
                target: value.to_string(),
            },
        }),
    }
}

async fn blocking<F>(endpoint: &'static str, work: F) -> ApiResponse
where
    F: FnOnce() -> DaemonResult<Value> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(result)) => {
            debug!(endpoint, "Request succeeded");
            ApiResponse::success(result)
        }
        Ok(Err(e)) => {
            warn!(endpoint, error = %e, "Request failed");
            ApiResponse::from(e)
        }
        Err(e) => {
            warn!(endpoint, error = %e, "Request task aborted");
            ApiResponse::failed(format!("Request aborted: {}", e))
        }
    }
}

fn form_or_reject(
    endpoint: &'static str,
    form: Result<Form<ServiceForm>, FormRejection>,
) -> Result<ServiceForm, ApiResponse> {
    match form {
        Ok(Form(form)) => Ok(form),
        Err(rejection) => {
            warn!(endpoint, error = %rejection, "Malformed request body");
            Err(ApiResponse::failed(rejection.body_text()))
        }
    }
}

pub async fn list_services(State(manager): State<Arc<Manager>>) -> ApiResponse {
    blocking("/service/list", move || {
        Ok(Value::Array(manager.list_instances()))
    })
    .await
}

pub async fn list_definitions(State(manager): State<Arc<Manager>>) -> ApiResponse {
    blocking("/definition/list", move || {
        Ok(Value::Array(manager.list_definitions()))
    })
    .await
}

pub async fn get_detail(
    State(manager): State<Arc<Manager>>,
    form: Result<Form<ServiceForm>, FormRejection>,
) -> ApiResponse {
    let form = match form_or_reject("/service/detail/get", form) {
        Ok(form) => form,
        Err(response) => return response,
    };
    blocking("/service/detail/get", move || {
        let target = Target::parse(&form.target)?;
        let index = required("index", &form.index)?;
        manager.get_detail(target, index)
    })
    .await
}

/// Instances are addressed by `name` when present, else by `index`.
pub async fn set_detail(
    State(manager): State<Arc<Manager>>,
    form: Result<Form<ServiceForm>, FormRejection>,
) -> ApiResponse {
    let form = match form_or_reject("/service/detail/set", form) {
        Ok(form) => form,
        Err(response) => return response,
    };
    blocking("/service/detail/set", move || {
        let target = Target::parse(&form.target)?;
        let index = match target {
            Target::Service if !form.name.is_empty() => form.name.as_str(),
            _ => required("index", &form.index)?,
        };
        manager.set_detail(target, index, &form.option, &form.configuration)?;
        Ok(Value::from(SUCCESS))
    })
    .await
}

pub async fn create(
    State(manager): State<Arc<Manager>>,
    form: Result<Form<ServiceForm>, FormRejection>,
) -> ApiResponse {
    let form = match form_or_reject("/service/create", form) {
        Ok(form) => form,
        Err(response) => return response,
    };
    blocking("/service/create", move || {
        expect_target(&form.target, Target::Definition)?;
        let definition = required("index", &form.index)?;
        let name = required("name", &form.name)?;
        manager.create(definition, name, &form.option, &form.configuration)?;
        Ok(Value::from(SUCCESS))
    })
    .await
}

pub async fn delete(
    State(manager): State<Arc<Manager>>,
    form: Result<Form<ServiceForm>, FormRejection>,
) -> ApiResponse {
    let form = match form_or_reject("/service/delete", form) {
        Ok(form) => form,
        Err(response) => return response,
    };
    blocking("/service/delete", move || {
        manager.delete(required("name", &form.name)?)?;
        Ok(Value::from(SUCCESS))
    })
    .await
}

pub async fn control(
    State(manager): State<Arc<Manager>>,
    form: Result<Form<ServiceForm>, FormRejection>,
) -> ApiResponse {
    let form = match form_or_reject("/service/control", form) {
        Ok(form) => form,
        Err(response) => return response,
    };
    blocking("/service/control", move || {
        let action = Action::parse(&form.action)?;
        manager.control(required("name", &form.name)?, action)?;
        Ok(Value::from(SUCCESS))
    })
    .await
}

pub async fn upgrade(State(manager): State<Arc<Manager>>) -> ApiResponse {
    blocking("/service/upgrade", move || {
        let report = manager.upgrade()?;
        info!(
            root = %report.package_root,
            stopped = report.stopped.len(),
            started = report.started.len(),
            files = report.extracted,
            "Upgrade complete"
        );
        Ok(Value::from(SUCCESS))
    })
    .await
}

/// Stage the first multipart field as the upgrade package.
pub async fn upload(
    State(manager): State<Arc<Manager>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResponse {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            warn!(endpoint = "/service/upload", error = %rejection, "Malformed upload");
            return ApiResponse::failed(rejection.body_text());
        }
    };

    match receive_package(manager, &mut multipart).await {
        Ok(size) => {
            info!(size, "Upgrade package uploaded");
            ApiResponse::success(json!({ "size": size }))
        }
        Err(e) => {
            warn!(error = %e, "Upgrade package upload failed");
            ApiResponse::from(e)
        }
    }
}

/// Private sibling the upload is streamed into before it is staged.
fn part_path(target: &Path) -> PathBuf {
    let name = format!(
        ".{}.{}.part",
        target.file_name().unwrap_or_default().to_string_lossy(),
        Uuid::new_v4().simple()
    );
    target.with_file_name(name)
}

fn read_error(e: MultipartError) -> DaemonError {
    DaemonError::Package {
        kind: PackageErrorKind::Read {
            message: e.body_text(),
        },
    }
}

async fn receive_package(manager: Arc<Manager>, multipart: &mut Multipart) -> DaemonResult<u64> {
    let part = part_path(&manager.package_path());
    if let Some(parent) = part.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let written = write_first_field(multipart, &part).await;
    let size = match written {
        Ok(Some(size)) => size,
        Ok(None) => {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(DaemonError::missing_parameter("file"));
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }
    };

    let staged = tokio::task::spawn_blocking(move || manager.stage_package(&part))
        .await
        .map_err(io::Error::other)??;
    debug!(path = %staged.display(), "Upload staged");
    Ok(size)
}

async fn write_first_field(multipart: &mut Multipart, part: &Path) -> DaemonResult<Option<u64>> {
    let mut file = tokio::fs::File::create(part).await?;
    let mut size = None;

    while let Some(mut field) = multipart.next_field().await.map_err(read_error)? {
        if size.is_some() {
            debug!(field = ?field.name(), "Ignoring extra upload field");
            continue;
        }
        let mut total = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(read_error)? {
            file.write_all(&chunk).await?;
            total += chunk.len() as u64;
        }
        size = Some(total);
    }

    file.sync_all().await?;
    Ok(size)
}

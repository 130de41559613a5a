//! Error types for the servman daemon.
//!
//! The `Display` text of every variant is what operators see in the
//! `result` field of a failed management-plane response.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the daemon.
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors.
    #[error("{kind}")]
    Validation { kind: ValidationErrorKind },

    /// Unknown definition, instance or package.
    #[error("{kind}")]
    NotFound { kind: NotFoundKind },

    /// Request conflicts with current state.
    #[error("{kind}")]
    Conflict { kind: ConflictKind },

    /// Failure reported by the service supervisor, text preserved verbatim.
    #[error("{message}")]
    Control { message: String },

    /// Upgrade package errors.
    #[error("{kind}")]
    Package { kind: PackageErrorKind },

    /// Writing an instance configuration file failed.
    #[error("Write service configuration({config}) failed")]
    ConfigurationWrite {
        config: String,
        #[source]
        source: std::io::Error,
    },

    /// The persisted instances file has a malformed shape.
    #[error("Invalid services file: {message}")]
    InvalidServicesFile { message: String },

    /// Service host errors.
    #[error("Host error: {message}")]
    Host { message: String },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Validation error kinds.
#[derive(Error, Debug)]
pub enum ValidationErrorKind {
    #[error("Service log size is invalid")]
    InvalidLogSize,

    #[error("Service log keep(days) is invalid")]
    InvalidLogKeep,

    #[error("Service log type({value}) is invalid")]
    InvalidLogType { value: String },

    #[error("Service operation target({target}) is not recognized")]
    UnknownTarget { target: String },

    #[error("Service action({action}) is not recognized")]
    UnknownAction { action: String },

    #[error("Invalid service name '{name}': {message}")]
    InvalidServiceName { name: String, message: String },

    #[error("Path traversal detected in: {path}")]
    PathTraversal { path: PathBuf },

    #[error("Missing required parameter: {param}")]
    MissingParameter { param: String },

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },
}

/// Lookup failures.
#[derive(Error, Debug)]
pub enum NotFoundKind {
    #[error("Service definition({id}) does not exist")]
    Definition { id: String },

    #[error("Service({name}) does not exist")]
    Service { name: String },

    #[error("Upgrade package not found")]
    Package,

    #[error("Service module({key}) is not registered")]
    Module { key: String },
}

/// State conflicts.
#[derive(Error, Debug)]
pub enum ConflictKind {
    #[error("Service({name}) has already exist")]
    AlreadyExists { name: String },

    #[error("Service state({status}) is not stopped")]
    NotStopped { status: String },
}

/// Upgrade package error kinds.
#[derive(Error, Debug)]
pub enum PackageErrorKind {
    #[error("Unsupported package type")]
    UnsupportedType,

    #[error("Unsupported package format")]
    UnsupportedFormat,

    #[error("Read upgrade package failed: {message}")]
    Read { message: String },

    #[error("Write package entry({path}) failed: {message}")]
    Write { path: PathBuf, message: String },
}

impl DaemonError {
    /// Shorthand for a validation error on a named parameter.
    pub fn invalid_parameter(param: &str, message: impl Into<String>) -> Self {
        DaemonError::Validation {
            kind: ValidationErrorKind::InvalidParameter {
                param: param.to_string(),
                message: message.into(),
            },
        }
    }

    /// Shorthand for a missing required parameter.
    pub fn missing_parameter(param: &str) -> Self {
        DaemonError::Validation {
            kind: ValidationErrorKind::MissingParameter {
                param: param.to_string(),
            },
        }
    }
}

/// Result type alias for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;

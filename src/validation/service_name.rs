//! Instance name validation.
//!
//! Instance names double as OS unit names and file names, so only a
//! conservative character set is accepted.

use crate::error::{DaemonError, ValidationErrorKind};

const MAX_NAME_LEN: usize = 128;

/// Validate that a name can be used as an OS service name.
///
/// # Example
///
/// ```
/// use servman_daemon::validation::validate_instance_name;
///
/// assert!(validate_instance_name("worker-1").is_ok());
/// assert!(validate_instance_name("../etc").is_err());
/// ```
pub fn validate_instance_name(name: &str) -> Result<(), DaemonError> {
    let reject = |message: &str| {
        Err(DaemonError::Validation {
            kind: ValidationErrorKind::InvalidServiceName {
                name: name.to_string(),
                message: message.to_string(),
            },
        })
    };

    if name.is_empty() {
        return reject("Service name cannot be empty");
    }

    if name.len() > MAX_NAME_LEN {
        return reject("Service name is too long");
    }

    if name.starts_with('.') || name.starts_with('-') {
        return reject("Service name must start with a letter, digit or '_'");
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
    {
        return reject("Service name contains invalid characters");
    }

    Ok(())
}

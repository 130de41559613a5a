//! Typed access to JSON records with per-field validation.

use serde_json::{Map, Value};

use crate::error::{DaemonError, DaemonResult};

/// Read-only view over a JSON object.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    inner: &'a Map<String, Value>,
    /// Prefix for error messages (e.g., "log.").
    scope: &'static str,
}

impl<'a> Fields<'a> {
    /// View `value` as an object.
    pub fn new(value: &'a Value, what: &str) -> DaemonResult<Self> {
        value
            .as_object()
            .map(|inner| Self { inner, scope: "" })
            .ok_or_else(|| DaemonError::invalid_parameter(what, "expected an object"))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn present(&self, key: &str) -> Option<&'a Value> {
        self.inner.get(key).filter(|v| !v.is_null())
    }

    fn param(&self, key: &str) -> String {
        format!("{}{}", self.scope, key)
    }

    /// Required string field.
    pub fn require_string(&self, key: &str) -> DaemonResult<&'a str> {
        self.optional_string(key)?
            .ok_or_else(|| DaemonError::missing_parameter(&self.param(key)))
    }

    /// Optional string field; present but not a string is an error.
    pub fn optional_string(&self, key: &str) -> DaemonResult<Option<&'a str>> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(DaemonError::invalid_parameter(
                &self.param(key),
                "expected a string",
            )),
        }
    }

    /// Optional integer field.
    pub fn optional_i64(&self, key: &str) -> DaemonResult<Option<i64>> {
        match self.present(key) {
            None => Ok(None),
            Some(v) => v.as_i64().map(Some).ok_or_else(|| {
                DaemonError::invalid_parameter(&self.param(key), "expected an integer")
            }),
        }
    }

    /// Optional nested object.
    pub fn optional_object(&self, key: &str, scope: &'static str) -> DaemonResult<Option<Self>> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::Object(inner)) => Ok(Some(Self { inner, scope })),
            Some(_) => Err(DaemonError::invalid_parameter(
                &self.param(key),
                "expected an object",
            )),
        }
    }

    /// Required nested object.
    pub fn require_object(&self, key: &str, scope: &'static str) -> DaemonResult<Self> {
        self.optional_object(key, scope)?
            .ok_or_else(|| DaemonError::missing_parameter(&self.param(key)))
    }

    /// Raw value of a field, if present.
    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        self.present(key)
    }
}

//! Management plane response envelope.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::error::DaemonError;

/// Result code of a successful request.
pub const CODE_SUCCESS: i32 = 0;
/// Result code of a failed request.
pub const CODE_FAILED: i32 = -1;

/// `{ "code": 0|-1, "result": ... }`, always sent with status 200.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApiResponse {
    pub code: i32,
    pub result: Value,
}

impl ApiResponse {
    pub fn success(result: impl Into<Value>) -> Self {
        Self {
            code: CODE_SUCCESS,
            result: result.into(),
        }
    }

    /// Failure carrying a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            code: CODE_FAILED,
            result: Value::String(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }
}

impl From<DaemonError> for ApiResponse {
    fn from(error: DaemonError) -> Self {
        Self::failed(error.to_string())
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

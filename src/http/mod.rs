//! HTTP adapter of the management plane.
//!
//! Thin mapping from form-encoded endpoints to [`Manager`](crate::manager::Manager)
//! operations. Every other path serves the operator UI.

mod handlers;
mod response;
mod server;

pub use handlers::ServiceForm;
pub use response::{ApiResponse, CODE_FAILED, CODE_SUCCESS};
pub use server::{router, serve, UPLOAD_LIMIT};

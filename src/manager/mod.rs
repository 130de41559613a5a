//! Management plane.
//!
//! [`Manager`] guards the registry and exposes its operations to the HTTP
//! adapter. [`ManagerService`] packages the whole plane as the `servman`
//! module so it can run under the generic host.

#[allow(clippy::module_inception)]
mod manager;
mod service;

pub use manager::Manager;
pub use service::ManagerService;

//! Data model shared by the registry, the option codec and the upgrade
//! pipeline.

mod service;
mod status;

pub use service::*;
pub use status::ServiceStatus;

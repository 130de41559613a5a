//! Generic service host.
//!
//! The supervisor launches `servman-host <root> --service.lib=... --log.*=...`
//! for every registered instance. The host configures logging from the
//! `log.*` parameters, resolves the module, and drives its lifecycle until
//! a termination signal arrives.

mod args;
pub mod logging;
mod modules;
mod rotate;
mod runner;
mod sample;
mod signal;
mod traits;

pub use args::HostArgs;
pub use modules::{module_key, ModuleFactory, ModuleRegistry};
pub use rotate::RotatingFile;
pub use runner::{resolve_config, run_module, StopEvent};
pub use sample::{HeartbeatConfig, HeartbeatService};
pub use signal::shutdown_signal;
pub use traits::{ManagedService, ServiceContext};

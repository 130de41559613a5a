//! Managed service contract.

use std::path::PathBuf;

use tracing::Span;

use crate::error::DaemonError;

/// What the host hands a module at creation time.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    /// Span every module log line should be emitted in.
    pub span: Span,
    /// Installation root.
    pub root: PathBuf,
    /// Runtime configuration file, if the instance has one.
    pub config_path: Option<PathBuf>,
}

/// A module run by the generic service host.
///
/// The host calls [`create`](Self::create), then [`run`](Self::run) until
/// it returns, then [`destroy`](Self::destroy). `destroy` is always called
/// once `create` has succeeded.
///
/// # Example
///
/// ```ignore
/// pub struct Idle;
///
/// impl ManagedService for Idle {
///     fn name(&self) -> &'static str { "idle" }
///     fn create(&mut self, _ctx: &ServiceContext) -> Result<(), DaemonError> { Ok(()) }
///     fn run(&mut self, is_running: &dyn Fn() -> bool) {
///         while is_running() {
///             std::thread::sleep(std::time::Duration::from_millis(100));
///         }
///     }
/// }
/// ```
pub trait ManagedService: Send {
    /// Stable module key.
    fn name(&self) -> &'static str;

    /// One-time setup. An error aborts host startup.
    fn create(&mut self, ctx: &ServiceContext) -> Result<(), DaemonError>;

    /// Main loop. Must return soon after `is_running` turns false.
    fn run(&mut self, is_running: &dyn Fn() -> bool);

    /// Release resources acquired in `create`.
    fn destroy(&mut self) {}
}

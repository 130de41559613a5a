//! The management plane as a hosted module.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::{error, info, Span};

use crate::config::Settings;
use crate::control::build_control;
use crate::error::DaemonError;
use crate::host::{ManagedService, ServiceContext};
use crate::http;

use super::manager::Manager;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct Running {
    span: Span,
    runtime: Runtime,
    listener: Option<TcpListener>,
    router: axum::Router,
}

/// Runs the HTTP management plane under the generic host.
///
/// Reads daemon settings from the instance configuration, if any, with
/// `paths.root` forced to the host's root.
#[derive(Default)]
pub struct ManagerService {
    running: Option<Running>,
}

impl ManagedService for ManagerService {
    fn name(&self) -> &'static str {
        "servman"
    }

    fn create(&mut self, ctx: &ServiceContext) -> Result<(), DaemonError> {
        let _entered = ctx.span.enter();

        let mut settings = match &ctx.config_path {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        settings.paths.root = ctx.root.clone();

        let control = build_control(&settings.control)?;
        let manager = Arc::new(Manager::load(settings.layout(), control)?);
        let router = http::router(manager, settings.http_directory());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        let address = format!("{}:{}", settings.http.address, settings.http.port);
        let listener = runtime.block_on(TcpListener::bind(&address))?;
        info!(address = %address, "Management plane bound");

        self.running = Some(Running {
            span: ctx.span.clone(),
            runtime,
            listener: Some(listener),
            router,
        });
        Ok(())
    }

    fn run(&mut self, is_running: &dyn Fn() -> bool) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        let _entered = running.span.enter();
        let Some(listener) = running.listener.take() else {
            return;
        };

        let local: Option<SocketAddr> = listener.local_addr().ok();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = running.runtime.spawn(http::serve(
            listener,
            running.router.clone(),
            async move {
                let _ = stop_rx.await;
            },
        ));
        info!(address = ?local, "Management plane serving");

        while is_running() && !server.is_finished() {
            thread::sleep(POLL_INTERVAL);
        }

        let _ = stop_tx.send(());
        match running.runtime.block_on(server) {
            Ok(Ok(())) => info!("Management plane stopped"),
            Ok(Err(e)) => error!(error = %e, "Management plane failed"),
            Err(e) => error!(error = %e, "Management plane task aborted"),
        }
    }

    fn destroy(&mut self) {
        self.running = None;
    }
}

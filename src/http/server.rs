//! Router assembly and serving.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::info;

use crate::error::DaemonResult;
use crate::manager::Manager;

use super::handlers;

/// Largest accepted upgrade package.
pub const UPLOAD_LIMIT: usize = 1024 * 1024 * 1024;

/// Management endpoints plus the operator UI served from `static_dir`.
pub fn router(manager: Arc<Manager>, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route(
            "/service/list",
            get(handlers::list_services).post(handlers::list_services),
        )
        .route(
            "/definition/list",
            get(handlers::list_definitions).post(handlers::list_definitions),
        )
        .route("/service/detail/get", post(handlers::get_detail))
        .route("/service/detail/set", post(handlers::set_detail))
        .route("/service/create", post(handlers::create))
        .route("/service/delete", post(handlers::delete))
        .route("/service/control", post(handlers::control))
        .route("/service/upgrade", post(handlers::upgrade))
        .route(
            "/service/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .with_state(manager)
}

/// Serve `router` until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> DaemonResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(address = ?listener.local_addr().ok(), "HTTP server started");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

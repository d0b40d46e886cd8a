use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use sync_core::prelude::*;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router<B: BackendClient + 'static>(state: AppState<B>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::<B>))
        .route("/health/live", get(handlers::health::<B>))
        .route("/health/ready", get(handlers::readiness::<B>))
        .route("/metrics", get(handlers::metrics_handler::<B>))
        .route("/api/v1/sync/trigger", post(handlers::trigger_sync::<B>))
        .route("/api/v1/sync/alarms", get(handlers::list_alarms::<B>))
        .route("/api/v1/sync/logs", get(handlers::list_logs::<B>))
        .route("/api/v1/sync/statistics", get(handlers::statistics::<B>))
        .route("/api/v1/sync/status", get(handlers::status::<B>))
        .route("/api/v1/admin/service/control", post(handlers::service_control::<B>))
        .layer(
            ServiceBuilder::new()
                .layer(SetSensitiveHeadersLayer::new([axum::http::header::AUTHORIZATION]))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CatchPanicLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Binds and serves `app`, draining on the same shutdown signal the
/// reconciler task watches.
pub async fn serve(
    host: String,
    port: u16,
    app: Router,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!(%host, port, "admin HTTP surface listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            tracing::info!("HTTP server shutting down");
        })
        .await
}

/// Races SIGINT against SIGTERM; resolves on whichever arrives first.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

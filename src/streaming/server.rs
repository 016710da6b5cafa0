use super::generator::StreamSettings;
use super::handlers::{
    capture_handler, health_handler, index_handler, last_sample_handler, video_feed_handler,
};
use crate::capture::CaptureCoordinator;
use crate::error::{Result, StreamError};
use crate::monitor::MonitorState;
use crate::sample::{SAMPLES_ROUTE, SAMPLE_EXTENSION};
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for the Axum handlers
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<MonitorState>,
    pub coordinator: Arc<CaptureCoordinator>,
    pub stream: StreamSettings,
    pub shutdown: CancellationToken,
}

/// All routes, with stored samples served from `samples_dir`
pub fn build_router(state: AppState, samples_dir: &Path) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/video_feed", get(video_feed_handler))
        .route("/capture", post(capture_handler))
        .route("/last_sample", get(last_sample_handler))
        .route("/health", get(health_handler))
        .nest_service(SAMPLES_ROUTE, samples_service(samples_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Stored samples only; in-flight `.partial` writes stay hidden
fn samples_service(samples_dir: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(samples_dir))
        .layer(middleware::from_fn(only_finished_samples))
}

async fn only_finished_samples(request: Request, next: Next) -> Response {
    let is_sample = request
        .uri()
        .path()
        .rsplit_once('.')
        .is_some_and(|(_, extension)| extension == SAMPLE_EXTENSION);

    if is_sample {
        next.run(request).await
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// HTTP server bound to its listening socket
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
}

impl HttpServer {
    /// Bind `address` now so a taken port is reported at startup
    pub async fn bind(address: &str, router: Router) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| StreamError::BindFailed {
                address: address.to_string(),
                source: e,
            })?;

        info!("HTTP server listening on {}", address);
        Ok(Self { listener, router })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` fires, then drain open connections
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| StreamError::StartupFailed {
                details: format!("Server error: {}", e),
            })?;

        info!("HTTP server stopped");
        Ok(())
    }
}

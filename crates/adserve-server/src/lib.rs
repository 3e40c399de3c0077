// Server mode - HTTP API in front of the tracking pipeline
//
// Features:
// - Axum HTTP server (HTTP/1.1, HTTP/2)
// - Line-item CRUD and ad selection over an in-memory store
// - Tracking ingestion through a bounded queue and a single batch worker
// - Structured logging with tracing
// - Graceful shutdown with a final tracking flush
//
// A failed tracking flush is fatal: the worker cancels the shared token, the
// HTTP server drains and `run_with_config` returns the worker's error.

use std::sync::Arc;
use std::time::Duration;

use adserve_batch::IngestQueue;
use adserve_config::{AppConfig, RuntimeConfig};
use adserve_core::{AdSelector, LineItemStore};
use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info, warn};

mod handlers;
mod init;

use handlers::{
    create_line_item, get_line_item, get_winning_ads, health_check, list_line_items, track_event,
};
pub use init::{batch_config, init_sink, init_tracing};

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LineItemStore>,
    pub selector: Arc<AdSelector>,
    pub queue: IngestQueue,
    pub app: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: &RuntimeConfig, queue: IngestQueue) -> Self {
        let store = Arc::new(LineItemStore::new());
        let selector = Arc::new(AdSelector::new(
            Arc::clone(&store),
            config.ads.serve_base_url.clone(),
        ));

        Self {
            store,
            selector,
            queue,
            app: Arc::new(config.app.clone()),
        }
    }
}

/// Error type that implements IntoResponse
///
/// Rendered as `{"code": <status>, "message": <text>, "details"?: <text>}`.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request error: {:?}", self.error);
        } else {
            warn!(status = self.status.as_u16(), "Request rejected: {}", self.error);
        }

        let mut body = json!({
            "code": self.status.as_u16(),
            "message": self.error.to_string(),
        });
        if let Some(details) = self.details {
            body["details"] = json!(details);
        }

        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self {
            status,
            error,
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, anyhow::anyhow!(message.into()))
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Build the HTTP router
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/v1/lineitems",
            post(create_line_item).get(list_line_items),
        )
        .route("/api/v1/lineitems/:id", get(get_line_item))
        .route("/api/v1/ads", get(get_winning_ads))
        .route("/api/v1/tracking", post(track_event))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

/// Entry point for server mode
pub async fn run_with_config(config: RuntimeConfig) -> Result<()> {
    init_tracing(&config);

    info!(
        app = %config.app.name,
        environment = %config.app.environment,
        version = %config.app.version,
        "Starting ad server"
    );

    let addr = config.server.listen_addr.clone();

    // Tracking pipeline
    let sink = init_sink(&config.sink)?;
    let (queue, worker) = adserve_batch::channel(batch_config(&config.tracking), sink);
    let cancel = CancellationToken::new();

    let worker_cancel = cancel.clone();
    let worker_handle = tokio::spawn(async move {
        let result = worker.run(worker_cancel.clone()).await;
        if let Err(err) = &result {
            error!(
                error = %err,
                events_lost = err.events(),
                "Tracking worker failed, shutting down"
            );
            worker_cancel.cancel();
        }
        result
    });

    let state = AppState::new(&config, queue);
    let app = router(state, config.server.request_timeout());

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    info!("Ad server listening on http://{}", addr);
    info!("Routes:");
    info!("  GET  http://{}/health             - Health check", addr);
    info!("  POST http://{}/api/v1/lineitems   - Create line item", addr);
    info!("  GET  http://{}/api/v1/lineitems   - List line items", addr);
    info!("  GET  http://{}/api/v1/lineitems/:id - Get line item", addr);
    info!("  GET  http://{}/api/v1/ads         - Winning ads", addr);
    info!("  POST http://{}/api/v1/tracking    - Track event", addr);
    info!("Press Ctrl+C or send SIGTERM to stop");

    let server_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown_signal() => {},
                _ = server_cancel.cancelled() => {},
            }
        })
        .await
        .context("Server error")?;

    // Stop the worker and wait for its final flush
    cancel.cancel();
    worker_handle
        .await
        .context("Tracking worker task panicked")?
        .context("Tracking worker stopped with a fatal error")?;

    info!("Server shutdown complete");

    Ok(())
}

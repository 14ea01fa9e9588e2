//! `registrar serve` -- mock academic-metrics data service.
//!
//! Serves a JSON data file through the in-memory approval service using
//! `axum` + `tokio`, with the same wire contract the HTTP client speaks.
//! Updates are written back to the data file.
//!
//! Security features:
//! - CORS headers on all responses (permissive for local dev)
//! - Optional API key authentication via REGISTRAR_API_KEY env var
//!
//! Endpoints:
//! - GET   /health                                 - Server status (exempt from auth)
//! - GET   /approvals/pending?role&limit           - Records awaiting the role's stage
//! - GET   /approvals/processed?role&status&limit  - Records the role's stage has handled
//! - PATCH /approvals/{metrics_id}                 - Apply `{"fields": {...}}` atomically
//!
//! All responses use Content-Type: application/json; errors are
//! `{"error": "message"}`.

mod handlers;
mod middleware;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{middleware as axum_middleware, Json, Router};
use registrar_storage::MemoryApprovalService;
use tower_http::cors::{Any, CorsLayer};

use self::handlers::{
    handle_health, handle_not_found, handle_pending, handle_processed, handle_update,
};
use self::middleware::auth_middleware;
use self::state::AppState;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::PATCH])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/approvals/pending", get(handle_pending))
        .route("/approvals/processed", get(handle_processed))
        .route("/approvals/{metrics_id}", patch(handle_update))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Load `data_file` and serve it until Ctrl+C.
pub async fn start_server(
    host: &str,
    port: u16,
    data_file: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = MemoryApprovalService::open(&data_file).await?;
    let count = service.records().await.len();
    tracing::info!(path = %data_file.display(), records = count, "data file loaded");

    let api_key = std::env::var("REGISTRAR_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());
    if api_key.is_some() {
        eprintln!("API key authentication enabled");
    }

    let app = router(Arc::new(AppState { service, api_key }));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!(
        "Serving {} records from {} on http://{}",
        count,
        data_file.display(),
        addr
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    eprintln!("\nServer shut down.");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    eprintln!("\nReceived shutdown signal...");
}

//! Route handlers for the mock academic-metrics service.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use registrar_core::{ApprovalFields, ProcessedStatus, Role};
use registrar_storage::{ApprovalService, ServiceError};
use serde::Deserialize;

use super::json_error;
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    role: Option<String>,
    status: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateBody {
    fields: ApprovalFields,
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "records": state.service.records().await.len(),
    });
    (StatusCode::OK, Json(response))
}

/// GET /approvals/pending?role=R&limit=N
pub(crate) async fn handle_pending(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, &e.body_text()).into_response(),
    };
    let role = match parse_role(query.role.as_deref()) {
        Ok(role) => role,
        Err(response) => return response,
    };
    match state
        .service
        .fetch_pending(role, query.limit.unwrap_or(0))
        .await
    {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => service_error(&e),
    }
}

/// GET /approvals/processed?role=R&status=S&limit=N
pub(crate) async fn handle_processed(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, &e.body_text()).into_response(),
    };
    let role = match parse_role(query.role.as_deref()) {
        Ok(role) => role,
        Err(response) => return response,
    };
    let status = match query.status.as_deref().map(str::parse::<ProcessedStatus>) {
        None => ProcessedStatus::All,
        Some(Ok(status)) => status,
        Some(Err(message)) => return json_error(StatusCode::BAD_REQUEST, &message).into_response(),
    };
    match state
        .service
        .fetch_processed(role, status, query.limit.unwrap_or(0))
        .await
    {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => service_error(&e),
    }
}

/// PATCH /approvals/{metrics_id} with `{"fields": {...}}`
pub(crate) async fn handle_update(
    State(state): State<Arc<AppState>>,
    Path(metrics_id): Path<String>,
    body: Result<Json<UpdateBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, &e.body_text()).into_response(),
    };
    match state.service.update_approval(&metrics_id, &body.fields).await {
        Ok(updated) => {
            tracing::info!(%metrics_id, "approval fields applied");
            let response = serde_json::json!({ "updatedMetrics": updated });
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => service_error(&e),
    }
}

fn parse_role(role: Option<&str>) -> Result<Role, Response> {
    let Some(role) = role else {
        return Err(
            json_error(StatusCode::BAD_REQUEST, "missing 'role' query parameter").into_response(),
        );
    };
    role.parse::<Role>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, &e.to_string()).into_response())
}

fn service_error(error: &ServiceError) -> Response {
    let status = match error {
        ServiceError::Rejected { .. } => StatusCode::CONFLICT,
        ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
        ServiceError::Transport(_) => StatusCode::BAD_GATEWAY,
        ServiceError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::warn!(error = %error, "request failed");
    }
    json_error(status, &error.to_string()).into_response()
}

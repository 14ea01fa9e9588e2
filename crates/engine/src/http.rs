//! HTTP client for the academic-metrics data service.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. Endpoints:
//!
//! - `GET  {base}/approvals/pending?role=R&limit=N`
//! - `GET  {base}/approvals/processed?role=R&status=S&limit=N`
//! - `PATCH {base}/approvals/{metricsId}` with `{"fields": {...}}`
//!
//! Error bodies are `{"error": "message"}`; the message is surfaced as-is.

use std::time::Duration;

use async_trait::async_trait;
use registrar_core::{ApprovalFields, ProcessedStatus, Role};
use registrar_storage::{ApprovalService, Page, ServiceError, UpdatedMetrics};
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// `ApprovalService` over HTTP.
///
/// - `auth_token` is sent as `Authorization: Bearer <token>` when set
/// - `timeout` bounds each request end to end; requests are never retried
#[derive(Debug, Clone)]
pub struct HttpApprovalService {
    base_url: String,
    auth_token: Option<String>,
    timeout: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    updated_metrics: UpdatedMetrics,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

enum Method {
    Get(Vec<(&'static str, String)>),
    Patch(serde_json::Value),
}

impl HttpApprovalService {
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> Self {
        HttpApprovalService {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn agent(&self) -> ureq::Agent {
        ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(self.timeout))
            .build()
            .into()
    }

    async fn request<T>(&self, path: String, method: Method) -> Result<T, ServiceError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = format!("{}{}", self.base_url, path);
        let agent = self.agent();
        let auth = self.auth_token.as_ref().map(|t| format!("Bearer {t}"));

        tokio::task::spawn_blocking(move || {
            let result = match method {
                Method::Get(query) => {
                    let mut request = agent.get(&url);
                    if let Some(auth) = &auth {
                        request = request.header("Authorization", auth);
                    }
                    for (key, value) in &query {
                        request = request.query(key, value);
                    }
                    request.call()
                }
                Method::Patch(body) => {
                    let mut request = agent.patch(&url);
                    if let Some(auth) = &auth {
                        request = request.header("Authorization", auth);
                    }
                    request.send_json(&body)
                }
            };
            let response = result.map_err(|e| ServiceError::Transport(e.to_string()))?;

            let status = response.status().as_u16();
            let body = response
                .into_body()
                .read_to_string()
                .map_err(|e| ServiceError::Transport(format!("failed to read response: {e}")))?;
            decode_response(status, &body)
        })
        .await
        .map_err(|e| ServiceError::Transport(format!("task join error: {e}")))?
    }
}

/// Map a status and raw body to a typed result.
fn decode_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ServiceError> {
    if (200..300).contains(&status) {
        return serde_json::from_str(body).map_err(|e| {
            ServiceError::Transport(format!("failed to parse response as JSON: {e}"))
        });
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) if !err.error.trim().is_empty() => Err(ServiceError::Rejected { message: err.error }),
        _ => Err(ServiceError::Transport(format!("http status {status}"))),
    }
}

/// Percent-encode one URL path segment.
fn encode_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[async_trait]
impl ApprovalService for HttpApprovalService {
    async fn fetch_pending(&self, role: Role, limit: usize) -> Result<Page, ServiceError> {
        let query = vec![("role", role.to_string()), ("limit", limit.to_string())];
        self.request("/approvals/pending".to_string(), Method::Get(query))
            .await
    }

    async fn fetch_processed(
        &self,
        role: Role,
        status: ProcessedStatus,
        limit: usize,
    ) -> Result<Page, ServiceError> {
        let query = vec![
            ("role", role.to_string()),
            ("status", status.to_string()),
            ("limit", limit.to_string()),
        ];
        self.request("/approvals/processed".to_string(), Method::Get(query))
            .await
    }

    async fn update_approval(
        &self,
        metrics_id: &str,
        fields: &ApprovalFields,
    ) -> Result<UpdatedMetrics, ServiceError> {
        let path = format!("/approvals/{}", encode_segment(metrics_id));
        let body = serde_json::json!({ "fields": fields });
        let response: UpdateResponse = self.request(path, Method::Patch(body)).await?;
        Ok(response.updated_metrics)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

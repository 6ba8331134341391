//! HTTP surface for docinsight.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /analyze` – Accept a multipart upload of one or more files, parse each by extension,
//!   and run two-tier analytics. Every part carrying a filename is treated as an upload; other
//!   parts are ignored. Returns the combined batch report.
//! - `GET /metrics` – Observe batch, file, and fallback counters.
//! - `GET /health` – Liveness probe.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Errors are reported as `{ "success": false, "error": "..." }` with a status matching the
//! failure: 400 for an empty or malformed request, 413 for an oversized file, 504 when the
//! batch deadline passes.

use crate::metrics::MetricsSnapshot;
use crate::processing::{BatchError, BatchReport, ProcessingApi, RawUpload};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Ceiling on the whole request body; individual files are checked against a smaller limit.
const MAX_REQUEST_BYTES: usize = 256 * 1024 * 1024;

/// Build the HTTP router exposing the analysis API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: ProcessingApi + 'static,
{
    Router::new()
        .route("/analyze", post(analyze_files::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/health", get(health))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(service)
}

/// Parse and analyze every uploaded file in the multipart body.
async fn analyze_files<S>(
    State(service): State<Arc<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BatchReport>, AppError>
where
    S: ProcessingApi,
{
    let uploads = collect_uploads(multipart?).await?;
    tracing::info!(files = uploads.len(), "Analyze request received");
    let report = service.analyze_batch(uploads).await?;
    Ok(Json(report))
}

async fn collect_uploads(mut multipart: Multipart) -> Result<Vec<RawUpload>, AppError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            tracing::debug!(field = ?field.name(), "Skipping multipart field without filename");
            continue;
        };
        let bytes = field.bytes().await?;
        uploads.push(RawUpload::new(filename, bytes.to_vec()));
    }
    Ok(uploads)
}

/// Return the current batch counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: ProcessingApi,
{
    Json(service.metrics_snapshot())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "analyze",
                method: "POST",
                path: "/analyze",
                description: "Upload files as multipart/form-data (xlsx, xlsm, xls, ods, csv, pdf). Each file is parsed and analyzed; the response lists per-file results and errors.",
                request_example: Some(json!({
                    "files": ["sales.xlsx", "report.pdf"]
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return batch, file, and fallback counters useful for observability dashboards.",
                request_example: None,
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Liveness probe returning { \"status\": \"ok\" }.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    Batch(BatchError),
    Upload { status: StatusCode, message: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Batch(error) => {
                let status = match &error {
                    BatchError::NoFilesProvided => StatusCode::BAD_REQUEST,
                    BatchError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    BatchError::BatchTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                };
                (status, error.to_string())
            }
            Self::Upload { status, message } => (status, message),
        };
        if status.is_server_error() {
            tracing::error!(%status, error = %message, "Analyze request failed");
        } else {
            tracing::warn!(%status, error = %message, "Analyze request rejected");
        }
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

impl From<BatchError> for AppError {
    fn from(inner: BatchError) -> Self {
        Self::Batch(inner)
    }
}

impl From<MultipartError> for AppError {
    fn from(inner: MultipartError) -> Self {
        Self::Upload {
            status: inner.status(),
            message: inner.body_text(),
        }
    }
}

impl From<MultipartRejection> for AppError {
    fn from(inner: MultipartRejection) -> Self {
        Self::Upload {
            status: inner.status(),
            message: inner.body_text(),
        }
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tradecard_core::cache::CacheError;
use tradecard_core::error::CoreError;
use tradecard_core::queue::QueueClosed;
use tradecard_core::sources::SourceError;
use tradecard_pipeline::error::PipelineError;

use crate::config::ConfigError;
use crate::monitor::AdmissionError;

/// Non-standard status telling the dispatcher to retry on another worker.
pub const REJECTED_STATUS: u16 = 367;

/// Application-level error type for HTTP handlers.
///
/// Each variant maps to one fixed JSON error shape.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Memory or concurrency admission failed.
    #[error(transparent)]
    Rejected(#[from] AdmissionError),

    /// A domain-level error from `tradecard_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The body had no usable `tradeData` field.
    #[error("Missing tradeData")]
    MissingTradeData,

    /// The body was not valid JSON for this endpoint.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// The render pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    QueueClosed(#[from] QueueClosed),

    /// An upstream data source failed.
    #[error(transparent)]
    Upstream(#[from] SourceError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn rejected_status() -> StatusCode {
    StatusCode::from_u16(REJECTED_STATUS).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            // --- Admission ---
            AppError::Rejected(AdmissionError::Overloaded {
                ram_usage,
                ram_limit,
            }) => (
                rejected_status(),
                json!({
                    "error": "Worker overloaded",
                    "stage": "pre-check",
                    "ramUsage": ram_usage,
                    "ramLimit": ram_limit,
                }),
            ),
            AppError::Rejected(AdmissionError::Busy {
                active_jobs,
                max_jobs,
            }) => (
                rejected_status(),
                json!({
                    "error": "Worker busy",
                    "stage": "concurrency",
                    "activeJobs": active_jobs,
                    "maxJobs": max_jobs,
                }),
            ),

            // --- Validation ---
            AppError::MissingTradeData => {
                (StatusCode::BAD_REQUEST, json!({ "error": "Missing tradeData" }))
            }
            AppError::Core(CoreError::Validation(msg)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid tradeData", "details": msg }),
            ),
            AppError::InvalidBody(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid request body", "details": msg }),
            ),

            // --- Job failures ---
            AppError::Pipeline(_)
            | AppError::QueueClosed(_)
            | AppError::InternalError(_) => {
                tracing::error!(error = %self, "Image generation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to generate image", "details": self.to_string() }),
                )
            }

            // --- Upstream ---
            AppError::Upstream(err) => {
                tracing::error!(error = %err, "Upstream request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Upstream request failed", "details": err.to_string() }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Failures that stop the worker from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Template(#[from] PipelineError),

    #[error("Invalid bind address {addr}: {reason}")]
    Address { addr: String, reason: String },

    #[error("Invalid CORS origin '{origin}': {reason}")]
    CorsOrigin { origin: String, reason: String },

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use modelbay_core::error::CoreError;
use modelbay_docker::controller::StartError;
use modelbay_lifecycle::error::LifecycleError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`LifecycleError`] and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),

            AppError::Lifecycle(err) => match err {
                LifecycleError::Core(core) => classify_core_error(core),
                LifecycleError::NotRunning { .. } => {
                    (StatusCode::BAD_REQUEST, "MODEL_NOT_RUNNING", err.to_string())
                }
                LifecycleError::Build(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "BUILD_FAILED",
                    err.to_string(),
                ),
                LifecycleError::Start(StartError::PortInUse { .. }) => {
                    (StatusCode::CONFLICT, "CONFLICT", err.to_string())
                }
                LifecycleError::Start(_) | LifecycleError::Stop(_) => {
                    tracing::warn!(error = %err, "Container runtime error");
                    (StatusCode::BAD_GATEWAY, "RUNTIME_ERROR", err.to_string())
                }
                LifecycleError::Artifact(e) => {
                    tracing::error!(error = %e, "Artifact storage error");
                    internal()
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

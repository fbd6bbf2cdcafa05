use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kvgen_cloud::StorageError;
use kvgen_comfyui::error::ErrorKind;
use kvgen_core::error::CoreError;
use kvgen_llm::LlmError;
use kvgen_pipeline::{FlowFailure, PipelineError, StepRecord};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce the
/// `{success: false, error, code, steps}` body every route shares.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `kvgen_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A generation flow stopped at one of its steps.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An optional backend (chat, storage) has no configuration.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Listing or deleting stored generations failed.
    #[error("Storage request failed: {0}")]
    Storage(#[from] StorageError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut steps: &[StepRecord] = &[];

        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),

            AppError::Pipeline(err) => {
                steps = &err.steps;
                let (status, code) = match &err.failure {
                    FlowFailure::Invalid(CoreError::Validation(_)) => {
                        (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
                    }
                    FlowFailure::Invalid(_) => (StatusCode::INTERNAL_SERVER_ERROR, "TEMPLATE_ERROR"),
                    FlowFailure::Engine(engine) => match engine.kind() {
                        ErrorKind::Transport => (StatusCode::BAD_GATEWAY, "ENGINE_UNAVAILABLE"),
                        ErrorKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, "ENGINE_TIMEOUT"),
                        ErrorKind::RemoteExecution => {
                            (StatusCode::INTERNAL_SERVER_ERROR, "EXECUTION_ERROR")
                        }
                        ErrorKind::ContractViolation => {
                            (StatusCode::INTERNAL_SERVER_ERROR, "NO_RESULT")
                        }
                    },
                    FlowFailure::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
                };
                tracing::error!(error = %err, code, "Generation flow failed");
                (status, code, err.to_string())
            }

            AppError::Llm(err) => match err {
                LlmError::InvalidRequest(msg) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
                }
                other => {
                    tracing::error!(error = %other, "Chat completion failed");
                    (StatusCode::INTERNAL_SERVER_ERROR, "LLM_ERROR", other.to_string())
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::NotConfigured(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NOT_CONFIGURED",
                self.to_string(),
            ),
            AppError::Storage(err) => {
                tracing::error!(error = %err, "Storage request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", self.to_string())
            }
        };

        let body = json!({
            "success": false,
            "error": message,
            "code": code,
            "steps": steps,
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
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

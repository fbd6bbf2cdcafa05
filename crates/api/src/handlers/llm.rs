//! Handler for `POST /run_llm`.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use kvgen_llm::ChatRequest;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::input::parse_json_body;
use crate::response::FlowResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LlmBody {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LlmPayload {
    pub response: String,
}

/// POST /run_llm
///
/// Body `{prompt, system?}`. Returns `{success, response}`.
pub async fn run_llm(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<FlowResponse<LlmPayload>>> {
    let body: LlmBody = parse_json_body(&body)?;
    if body.prompt.trim().is_empty() {
        return Err(AppError::BadRequest("No prompt provided".to_string()));
    }

    let chat = state
        .chat
        .as_ref()
        .ok_or(AppError::NotConfigured("Chat completion"))?;

    let mut request = ChatRequest::new(body.prompt);
    if let Some(system) = body.system.filter(|s| !s.trim().is_empty()) {
        request = request.with_system(system);
    }

    let response = chat.complete(&request).await?;
    tracing::info!(chars = response.len(), "Chat completion returned");

    Ok(Json(FlowResponse::ok(LlmPayload { response })))
}

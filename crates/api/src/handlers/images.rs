//! Handlers for the stored generation records.

use axum::extract::{Path, Query, State};
use axum::Json;
use kvgen_cloud::GenerationStore;
use kvgen_core::error::CoreError;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::FlowResponse;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ImagesPayload {
    pub images: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct DeletedPayload {
    pub id: String,
}

fn store(state: &AppState) -> AppResult<&dyn GenerationStore> {
    state
        .store
        .as_deref()
        .ok_or(AppError::NotConfigured("Storage"))
}

/// GET /images?limit=N
///
/// Stored generation records, newest first.
pub async fn list_images(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<FlowResponse<ImagesPayload>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let images = store(&state)?.list_generations(limit).await?;
    Ok(Json(FlowResponse::ok(ImagesPayload { images })))
}

/// DELETE /images/{id}
///
/// Removes the record and its stored image.
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<FlowResponse<DeletedPayload>>> {
    if !store(&state)?.delete_generation(&id).await? {
        return Err(CoreError::NotFound {
            entity: "Generation",
            id,
        }
        .into());
    }
    tracing::info!(id = %id, "Generation record deleted");
    Ok(Json(FlowResponse::ok(DeletedPayload { id })))
}

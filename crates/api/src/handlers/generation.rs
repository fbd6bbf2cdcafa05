//! Handlers for the engine-backed generation routes.

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::Json;
use kvgen_core::naming::generated_image_filename;
use kvgen_core::templates::flux_lora::FluxLoraRequest;
use kvgen_core::templates::img2img::Img2ImgRequest;
use kvgen_core::types::Timestamp;
use kvgen_pipeline::{
    generate_flux_lora as run_flux_lora, generate_img2img as run_img2img, persist_generation,
    prompt_from_image, GenerationOutcome, PersistContext, PersistReport, PromptParams, StepRecord,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::input::{image_data_url, parse_json_body, read_image_form};
use crate::response::FlowResponse;
use crate::state::AppState;

/// Step name appended when generated images are written to storage.
const PERSIST_STEP: &str = "persist_images";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// JSON body of `POST /generate_flux_lora`.
#[derive(Debug, Deserialize)]
pub struct FluxLoraBody {
    #[serde(flatten)]
    pub request: FluxLoraRequest,
    /// Upload the results to storage and record their metadata.
    #[serde(default)]
    pub persist: bool,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PromptPayload {
    pub prompt: String,
}

/// One generated image as returned to the caller.
#[derive(Debug, Serialize)]
pub struct GeneratedImage {
    pub node_id: String,
    /// Inline `data:` URL of the image bytes.
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub generated_at: Timestamp,
    pub seed: u64,
    /// Public storage URL, present once the image was persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerationPayload {
    pub prompt_id: String,
    pub seed: u64,
    pub images: Vec<GeneratedImage>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /generate_prompt
///
/// Multipart with an `image` part. Returns the caption the engine wrote
/// for it.
pub async fn generate_prompt(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<FlowResponse<PromptPayload>>> {
    let form = read_image_form(multipart).await?;
    tracing::info!(filename = %form.filename, bytes = form.bytes.len(), "Prompt requested");

    let outcome = prompt_from_image(
        state.engine.as_ref(),
        &state.templates,
        form.bytes,
        &form.filename,
        &PromptParams::default(),
    )
    .await?;

    Ok(Json(
        FlowResponse::ok(PromptPayload {
            prompt: outcome.prompt,
        })
        .with_steps(outcome.steps),
    ))
}

/// POST /generate_flux_lora
///
/// JSON body, see [`FluxLoraBody`]. With `persist: true` every image is
/// also uploaded to storage; a storage failure is reported in the
/// `persist_images` step without failing the request.
pub async fn generate_flux_lora(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<FlowResponse<GenerationPayload>>> {
    let body: FluxLoraBody = parse_json_body(&body)?;

    let store = if body.persist {
        Some(state.store.clone().ok_or(AppError::NotConfigured("Storage"))?)
    } else {
        None
    };

    let outcome = run_flux_lora(state.engine.as_ref(), &state.templates, &body.request).await?;
    let resolution = body.request.resolution();

    let report = match store {
        Some(store) => {
            let context = PersistContext::for_flux_lora(
                &body.request,
                body.style.as_deref().unwrap_or_default(),
                body.product.as_deref().unwrap_or_default(),
            );
            Some(persist_generation(store.as_ref(), &outcome, &context).await)
        }
        None => None,
    };

    Ok(Json(respond_with_images(outcome, Some(resolution), report)))
}

/// POST /generate_img2img
///
/// Multipart with an `image` part plus the text fields
/// `positive_prompt`, `negative_prompt`, `checkpoint` and `seed`.
pub async fn generate_img2img(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<FlowResponse<GenerationPayload>>> {
    let form = read_image_form(multipart).await?;

    let seed = form
        .field("seed")
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| AppError::BadRequest(format!("Invalid seed '{s}'")))
        })
        .transpose()?;
    let request = Img2ImgRequest {
        positive_prompt: form.field("positive_prompt").unwrap_or_default().to_string(),
        negative_prompt: form.field("negative_prompt").unwrap_or_default().to_string(),
        checkpoint: form.field("checkpoint").map(str::to_string),
        seed,
    };

    let outcome = run_img2img(
        state.engine.as_ref(),
        &state.templates,
        form.bytes,
        &form.filename,
        &request,
    )
    .await?;

    Ok(Json(respond_with_images(outcome, None, None)))
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn respond_with_images(
    outcome: GenerationOutcome,
    resolution: Option<String>,
    report: Option<PersistReport>,
) -> FlowResponse<GenerationPayload> {
    let mut steps = outcome.steps;
    if let Some(report) = &report {
        steps.push(persist_step(report));
    }

    let images = outcome
        .images
        .iter()
        .enumerate()
        .map(|(index, image)| {
            let stored_name = generated_image_filename(outcome.generated_at, outcome.seed, index);
            let saved = report
                .as_ref()
                .and_then(|r| r.saved.iter().find(|s| s.filename == stored_name));
            GeneratedImage {
                node_id: image.node_id.clone(),
                image_url: image_data_url(&image.image.filename, &image.bytes),
                resolution: resolution.clone(),
                generated_at: outcome.generated_at,
                seed: outcome.seed,
                storage_url: saved.map(|s| s.image_url.clone()),
                filename: saved.map(|s| s.filename.clone()),
            }
        })
        .collect();

    FlowResponse::ok(GenerationPayload {
        prompt_id: outcome.prompt_id,
        seed: outcome.seed,
        images,
    })
    .with_steps(steps)
}

fn persist_step(report: &PersistReport) -> StepRecord {
    let error = (!report.all_saved()).then(|| {
        report
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.filename, f.error))
            .collect::<Vec<_>>()
            .join("; ")
    });
    StepRecord {
        name: PERSIST_STEP.to_string(),
        success: error.is_none(),
        error,
    }
}

//! Image generation flows: flux-lora (text → image) and img2img.

use chrono::Utc;
use kvgen_comfyui::api::UploadOptions;
use kvgen_comfyui::fetcher::FetchedImage;
use kvgen_comfyui::session::GenerationEngine;
use kvgen_comfyui::waiter::CompletionCriterion;
use kvgen_core::seed::resolve_seed;
use kvgen_core::templates::flux_lora::{self, FluxLoraRequest};
use kvgen_core::templates::img2img::{self, Img2ImgRequest};
use kvgen_core::templates::{WorkflowKind, WorkflowTemplates};
use kvgen_core::types::Timestamp;
use kvgen_core::workflow::WorkflowGraph;

use crate::error::PipelineError;
use crate::steps::{StepLog, StepRecord};

/// Images produced by one generation flow.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub prompt_id: String,
    /// Seed written into the sampler node.
    pub seed: u64,
    pub images: Vec<FetchedImage>,
    pub generated_at: Timestamp,
    pub steps: Vec<StepRecord>,
}

/// Run the flux-lora workflow with `request`.
///
/// Steps: `update_workflow`, `execute_workflow`, `process_results`.
pub async fn generate_flux_lora(
    engine: &dyn GenerationEngine,
    templates: &WorkflowTemplates,
    request: &FluxLoraRequest,
) -> Result<GenerationOutcome, PipelineError> {
    let mut log = StepLog::new();
    let seed = resolve_seed(request.seed);

    let graph = templates
        .load(WorkflowKind::FluxLora)
        .and_then(|mut graph| flux_lora::apply(&mut graph, request, seed).map(|_| graph));
    let graph = match log.track("update_workflow", graph) {
        Ok(graph) => graph,
        Err(e) => {
            return Err(PipelineError::new(
                "Failed to update workflow",
                e,
                log.into_records(),
            ))
        }
    };

    tracing::info!(
        seed,
        width = request.width,
        height = request.height,
        batch_size = request.batch_size,
        lora = %request.lora_name,
        "Executing flux-lora workflow",
    );
    run_and_collect(engine, &graph, seed, log).await
}

/// Upload `image` and run the img2img workflow on it with `request`.
///
/// Steps: `upload_image`, `update_workflow`, `execute_workflow`,
/// `process_results`.
pub async fn generate_img2img(
    engine: &dyn GenerationEngine,
    templates: &WorkflowTemplates,
    image: Vec<u8>,
    filename: &str,
    request: &Img2ImgRequest,
) -> Result<GenerationOutcome, PipelineError> {
    let mut log = StepLog::new();
    let seed = resolve_seed(request.seed);

    let uploaded = match log.track(
        "upload_image",
        engine
            .upload_image(image, filename, &UploadOptions::isolated())
            .await,
    ) {
        Ok(uploaded) => uploaded,
        Err(e) => return Err(PipelineError::new("Image upload failed", e, log.into_records())),
    };

    let graph = templates.load(WorkflowKind::Img2Img).and_then(|mut graph| {
        img2img::apply(&mut graph, &uploaded.path(), request, seed).map(|_| graph)
    });
    let graph = match log.track("update_workflow", graph) {
        Ok(graph) => graph,
        Err(e) => {
            return Err(PipelineError::new(
                "Failed to update workflow",
                e,
                log.into_records(),
            ))
        }
    };

    tracing::info!(seed, image = %uploaded.path(), "Executing img2img workflow");
    run_and_collect(engine, &graph, seed, log).await
}

// ---- private helpers ----

async fn run_and_collect(
    engine: &dyn GenerationEngine,
    graph: &WorkflowGraph,
    seed: u64,
    mut log: StepLog,
) -> Result<GenerationOutcome, PipelineError> {
    let job = match log.track(
        "execute_workflow",
        engine
            .execute(graph, &CompletionCriterion::ExecutionFinished)
            .await,
    ) {
        Ok(job) => job,
        Err(e) => {
            return Err(PipelineError::new(
                "Workflow execution failed",
                e,
                log.into_records(),
            ))
        }
    };

    let images = match log.track(
        "process_results",
        engine.fetch_images(&job.handle, None).await,
    ) {
        Ok(images) => images,
        Err(e) => {
            return Err(PipelineError::new(
                "No images were found in the output",
                e,
                log.into_records(),
            ))
        }
    };

    tracing::info!(
        prompt_id = %job.handle.prompt_id,
        count = images.len(),
        "Generation finished",
    );

    Ok(GenerationOutcome {
        prompt_id: job.handle.prompt_id,
        seed,
        images,
        generated_at: Utc::now(),
        steps: log.into_records(),
    })
}

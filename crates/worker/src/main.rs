//! Command-line entrypoint running single flows against the configured
//! engine.

mod cli;

use std::path::Path;

use anyhow::{bail, Context};
use kvgen_cloud::{StorageConfig, SupabaseStore};
use kvgen_comfyui::config::ComfyUIConfig;
use kvgen_comfyui::session::ComfyUISession;
use kvgen_core::naming::generated_image_filename;
use kvgen_core::templates::WorkflowTemplates;
use kvgen_pipeline::{
    generate_flux_lora, persist_generation, prompt_from_image, PersistContext, PromptParams,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Command, FluxLoraJob, USAGE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvgen_worker=debug,kvgen_pipeline=info,kvgen_comfyui=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = match Command::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => bail!("{e}\n{USAGE}"),
    };

    let engine = ComfyUISession::new(&ComfyUIConfig::from_env());
    let templates = match std::env::var("WORKFLOW_DIR") {
        Ok(dir) if !dir.is_empty() => WorkflowTemplates::with_override_dir(dir),
        _ => WorkflowTemplates::builtin(),
    };

    match command {
        Command::FluxLora { params } => {
            run_flux_lora(&engine, &templates, params.as_deref()).await
        }
        Command::Prompt { image } => run_prompt(&engine, &templates, &image).await,
    }
}

async fn run_flux_lora(
    engine: &ComfyUISession,
    templates: &WorkflowTemplates,
    params: Option<&Path>,
) -> anyhow::Result<()> {
    let job = match params {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<FluxLoraJob>(&text)
                .with_context(|| format!("Invalid job file {}", path.display()))?
        }
        None => FluxLoraJob::default(),
    };

    let request = job.request();
    let outcome = generate_flux_lora(engine, templates, &request).await?;
    tracing::info!(
        prompt_id = %outcome.prompt_id,
        seed = outcome.seed,
        count = outcome.images.len(),
        "Images generated",
    );

    let Some(storage) = StorageConfig::from_env() else {
        tracing::warn!("Storage is not configured, writing images to the working directory");
        for (index, image) in outcome.images.iter().enumerate() {
            let filename = generated_image_filename(outcome.generated_at, outcome.seed, index);
            tokio::fs::write(&filename, &image.bytes)
                .await
                .with_context(|| format!("Failed to write {filename}"))?;
            println!("Saved {filename}");
        }
        return Ok(());
    };

    let store = SupabaseStore::new(storage);
    let context = PersistContext::for_flux_lora(&request, &job.style, &job.product);
    let report = persist_generation(&store, &outcome, &context).await;

    for saved in &report.saved {
        println!("Image uploaded and metadata saved: {}", saved.filename);
        println!(
            "Database record: {}",
            serde_json::to_string_pretty(&saved.record)?
        );
    }
    for failure in &report.failed {
        eprintln!("Error processing image {}: {}", failure.filename, failure.error);
    }

    if !report.all_saved() {
        bail!(
            "{} of {} images could not be persisted",
            report.failed.len(),
            outcome.images.len()
        );
    }
    Ok(())
}

async fn run_prompt(
    engine: &ComfyUISession,
    templates: &WorkflowTemplates,
    image: &Path,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read {}", image.display()))?;
    let filename = image
        .file_name()
        .and_then(|n| n.to_str())
        .context("Image path has no file name")?;

    let outcome =
        prompt_from_image(engine, templates, bytes, filename, &PromptParams::default()).await?;
    println!("{}", outcome.prompt);
    Ok(())
}

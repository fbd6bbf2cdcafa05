//! Flux GGUF text-to-image with a LoRA adapter.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::workflow::WorkflowGraph;

/// `KSampler` node; receives the seed.
pub const KSAMPLER_NODE: &str = "3";
/// `EmptyLatentImage` node; receives width, height and batch size.
pub const LATENT_NODE: &str = "5";
/// Positive `CLIPTextEncode` node.
pub const POSITIVE_NODE: &str = "6";
/// Negative `CLIPTextEncode` node.
pub const NEGATIVE_NODE: &str = "7";
/// `UnetLoaderGGUF` node; receives the model file name.
pub const UNET_NODE: &str = "10";
/// `LoraLoaderModelOnly` node; receives the LoRA file name.
pub const LORA_NODE: &str = "15";

/// Model used when the request does not name one.
pub const DEFAULT_MODEL: &str = "flux1-dev-Q4_0.gguf";

fn default_batch_size() -> u32 {
    1
}

/// Parameters of one flux-lora generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FluxLoraRequest {
    #[validate(range(min = 64, max = 4096))]
    pub width: u32,
    #[validate(range(min = 64, max = 4096))]
    pub height: u32,
    #[validate(length(min = 1))]
    pub lora_name: String,
    /// Overrides the template's model when set.
    #[serde(default)]
    pub model_name: Option<String>,
    #[validate(length(min = 1))]
    pub positive_prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 16))]
    pub batch_size: u32,
    /// Sampler seed; drawn at random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl FluxLoraRequest {
    /// `"{width}x{height}"`, as recorded in generation metadata.
    pub fn resolution(&self) -> String {
        crate::metadata::resolution_label(self.width, self.height)
    }
}

/// Validate the request and write it into the graph with `seed`.
pub fn apply(
    graph: &mut WorkflowGraph,
    request: &FluxLoraRequest,
    seed: u64,
) -> Result<(), CoreError> {
    request.validate()?;

    graph.set_input(KSAMPLER_NODE, "seed", seed)?;

    graph.set_input(LATENT_NODE, "width", request.width)?;
    graph.set_input(LATENT_NODE, "height", request.height)?;
    graph.set_input(LATENT_NODE, "batch_size", request.batch_size)?;

    graph.set_input(POSITIVE_NODE, "text", request.positive_prompt.as_str())?;
    graph.set_input(NEGATIVE_NODE, "text", request.negative_prompt.as_str())?;

    if let Some(model) = &request.model_name {
        graph.set_input(UNET_NODE, "unet_name", model.as_str())?;
    }
    graph.set_input(LORA_NODE, "lora_name", request.lora_name.as_str())?;

    Ok(())
}

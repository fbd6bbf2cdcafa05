//! Checkpoint image-to-image driven by an uploaded source image.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::workflow::WorkflowGraph;

pub const KSAMPLER_NODE: &str = "3";
pub const POSITIVE_NODE: &str = "6";
pub const NEGATIVE_NODE: &str = "7";
/// `LoadImage` node whose `image` input receives the uploaded path.
pub const LOAD_IMAGE_NODE: &str = "10";
/// `CheckpointLoaderSimple` node.
pub const CHECKPOINT_NODE: &str = "14";

/// Parameters of one img2img generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Img2ImgRequest {
    #[validate(length(min = 1))]
    pub positive_prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    /// Overrides the template's checkpoint when set.
    #[serde(default)]
    pub checkpoint: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Validate the request and write it, the uploaded image path, and
/// `seed` into the graph.
pub fn apply(
    graph: &mut WorkflowGraph,
    uploaded_path: &str,
    request: &Img2ImgRequest,
    seed: u64,
) -> Result<(), CoreError> {
    request.validate()?;

    graph.set_input(POSITIVE_NODE, "text", request.positive_prompt.as_str())?;
    graph.set_input(NEGATIVE_NODE, "text", request.negative_prompt.as_str())?;
    graph.set_input(KSAMPLER_NODE, "seed", seed)?;
    graph.set_input(LOAD_IMAGE_NODE, "image", uploaded_path)?;
    if let Some(ckpt) = &request.checkpoint {
        graph.set_input(CHECKPOINT_NODE, "ckpt_name", ckpt.as_str())?;
    }
    Ok(())
}

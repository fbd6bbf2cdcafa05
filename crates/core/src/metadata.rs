//! Metadata recorded for every persisted generated image.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// One row of the generation metadata table.
///
/// Created once per stored image and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub filename: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub style: String,
    pub product: String,
    /// `"{width}x{height}"`.
    pub resolution: String,
    pub lora_model: String,
    pub generated_at: Timestamp,
    pub image_url: String,
    pub seed: u64,
    /// Output node of the workflow that produced the image.
    pub node_id: String,
}

/// Format a resolution label, e.g. `1280x1024`.
pub fn resolution_label(width: u32, height: u32) -> String {
    format!("{width}x{height}")
}

//! MiniCPM-V prompt creator: captions an uploaded image.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::workflow::WorkflowGraph;

/// `Prompt_Generator` node holding the captioning parameters.
pub const PROMPT_GENERATOR_NODE: &str = "1";
/// `LoadImage` node whose `image` input receives the uploaded path.
pub const LOAD_IMAGE_NODE: &str = "3";
/// `ShowText` node whose `text` output is the generated prompt.
pub const SHOW_TEXT_NODE: &str = "4";

/// Captioning parameters written into [`PROMPT_GENERATOR_NODE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionParams {
    pub caption_method: String,
    pub max_new_tokens: u32,
    pub num_beams: u32,
    pub prefix_caption: String,
    pub suffix_caption: String,
    pub replace_tags: String,
}

impl Default for CaptionParams {
    fn default() -> Self {
        Self {
            caption_method: "long_prompt".to_string(),
            max_new_tokens: 2048,
            num_beams: 3,
            prefix_caption: String::new(),
            suffix_caption: String::new(),
            replace_tags: String::new(),
        }
    }
}

/// Point the graph at the uploaded image and set the caption parameters.
pub fn apply(
    graph: &mut WorkflowGraph,
    uploaded_path: &str,
    params: &CaptionParams,
) -> Result<(), CoreError> {
    graph.set_input(LOAD_IMAGE_NODE, "image", uploaded_path)?;

    let mut values = Map::new();
    values.insert("caption_method".into(), Value::from(params.caption_method.clone()));
    values.insert("max_new_tokens".into(), Value::from(params.max_new_tokens));
    values.insert("num_beams".into(), Value::from(params.num_beams));
    values.insert("prefix_caption".into(), Value::from(params.prefix_caption.clone()));
    values.insert("suffix_caption".into(), Value::from(params.suffix_caption.clone()));
    values.insert("replace_tags".into(), Value::from(params.replace_tags.clone()));
    graph.merge_inputs(PROMPT_GENERATOR_NODE, values)
}

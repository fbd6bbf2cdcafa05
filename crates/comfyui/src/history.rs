//! Typed view of `/history/{prompt_id}` records.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer};

use crate::api::ComfyUIApiError;

/// Reference to one image the engine wrote, as listed in a history
/// record. Passed back to `/view` to download the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(default = "default_folder_type", rename = "type")]
    pub folder_type: String,
}

fn default_folder_type() -> String {
    "output".to_string()
}

/// The outputs one node produced.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ImageRef>,
    /// Text outputs. Some nodes report a single string, others a list.
    #[serde(default, deserialize_with = "one_or_many")]
    pub text: Vec<String>,
}

/// One prompt's entry in the history map.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryRecord {
    #[serde(default)]
    pub outputs: BTreeMap<String, NodeOutput>,
    #[serde(default)]
    pub status: Option<serde_json::Value>,
}

impl HistoryRecord {
    /// A record counts as finished once any node has reported output.
    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }

    /// First non-empty text output of `node_id`.
    pub fn text_output(&self, prompt_id: &str, node_id: &str) -> Result<String, FetchError> {
        self.outputs
            .get(node_id)
            .and_then(|out| out.text.iter().find(|t| !t.trim().is_empty()))
            .cloned()
            .ok_or_else(|| FetchError::NoResult {
                prompt_id: prompt_id.to_string(),
                detail: format!("node {node_id} produced no text"),
            })
    }

    /// Image references of `node_id`, failing when there are none.
    pub fn image_outputs(&self, prompt_id: &str, node_id: &str) -> Result<&[ImageRef], FetchError> {
        match self.outputs.get(node_id) {
            Some(out) if !out.images.is_empty() => Ok(&out.images),
            _ => Err(FetchError::NoResult {
                prompt_id: prompt_id.to_string(),
                detail: format!("node {node_id} produced no images"),
            }),
        }
    }

    /// Every image reference in the record, tagged with its node id, in
    /// node-id order.
    pub fn all_images(&self) -> Vec<(String, ImageRef)> {
        self.outputs
            .iter()
            .flat_map(|(node, out)| out.images.iter().map(move |img| (node.clone(), img.clone())))
            .collect()
    }
}

/// Errors from reading a history record.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The history endpoint does not list the prompt yet.
    #[error("No history for prompt {prompt_id} yet")]
    NotReady { prompt_id: String },

    /// The record exists but the expected output is absent.
    #[error("No result produced for prompt {prompt_id}: {detail}")]
    NoResult { prompt_id: String, detail: String },

    #[error(transparent)]
    Api(#[from] ComfyUIApiError),
}

/// Pull the record for `prompt_id` out of a `/history` response.
pub fn take_record(
    mut history: HashMap<String, HistoryRecord>,
    prompt_id: &str,
) -> Result<HistoryRecord, FetchError> {
    history.remove(prompt_id).ok_or_else(|| FetchError::NotReady {
        prompt_id: prompt_id.to_string(),
    })
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Missing(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
        OneOrMany::Missing(()) => Vec::new(),
    })
}

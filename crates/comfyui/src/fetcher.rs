//! Result fetching once a prompt has finished.

use crate::api::ComfyUIApi;
use crate::history::{take_record, FetchError, HistoryRecord, ImageRef};

/// One downloaded output image.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// Node that produced the image.
    pub node_id: String,
    pub image: ImageRef,
    pub bytes: Vec<u8>,
}

/// Reads a finished prompt's outputs through the history and view
/// endpoints.
pub struct ResultFetcher<'a> {
    api: &'a ComfyUIApi,
}

impl<'a> ResultFetcher<'a> {
    pub fn new(api: &'a ComfyUIApi) -> Self {
        Self { api }
    }

    /// The history record of `prompt_id`.
    pub async fn record(&self, prompt_id: &str) -> Result<HistoryRecord, FetchError> {
        let history = self.api.get_history(prompt_id).await?;
        take_record(history, prompt_id)
    }

    /// Text output of `node_id`.
    pub async fn text(&self, prompt_id: &str, node_id: &str) -> Result<String, FetchError> {
        let record = self.record(prompt_id).await?;
        record.text_output(prompt_id, node_id)
    }

    /// Download the images of `node_id`, or of every image-bearing node
    /// when `node_id` is `None`.
    ///
    /// An empty result is a [`FetchError::NoResult`].
    pub async fn images(
        &self,
        prompt_id: &str,
        node_id: Option<&str>,
    ) -> Result<Vec<FetchedImage>, FetchError> {
        let record = self.record(prompt_id).await?;

        let refs: Vec<(String, ImageRef)> = match node_id {
            Some(node) => record
                .image_outputs(prompt_id, node)?
                .iter()
                .map(|img| (node.to_string(), img.clone()))
                .collect(),
            None => record.all_images(),
        };

        if refs.is_empty() {
            return Err(FetchError::NoResult {
                prompt_id: prompt_id.to_string(),
                detail: "no node produced images".to_string(),
            });
        }

        let mut fetched = Vec::with_capacity(refs.len());
        for (node_id, image) in refs {
            let bytes = self.api.view_image(&image).await?;
            tracing::debug!(
                prompt_id,
                node = %node_id,
                filename = %image.filename,
                size = bytes.len(),
                "Downloaded output image",
            );
            fetched.push(FetchedImage {
                node_id,
                image,
                bytes,
            });
        }
        Ok(fetched)
    }
}

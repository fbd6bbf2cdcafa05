//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission, history retrieval, image upload and image
//! download using [`reqwest`]. The configured authorization header is
//! attached to every request.

use std::collections::HashMap;

use async_trait::async_trait;
use kvgen_core::workflow::WorkflowGraph;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

use crate::config::{ComfyUIConfig, EngineAuth};
use crate::history::{HistoryRecord, ImageRef};
use crate::waiter::HistoryProbe;

/// HTTP client for a single ComfyUI instance.
#[derive(Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
    auth: Option<EngineAuth>,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
}

/// Response of `/upload/image`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    /// File name as stored by the engine (may differ from the one sent).
    pub name: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(default, rename = "type")]
    pub folder_type: Option<String>,
}

impl UploadResponse {
    /// Canonical path a `LoadImage` node must reference:
    /// `"<subfolder>/<name>"`, or just `<name>` without a subfolder.
    pub fn path(&self) -> String {
        if self.subfolder.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.subfolder, self.name)
        }
    }
}

/// Optional form fields sent along with an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub subfolder: Option<String>,
    pub overwrite: bool,
}

impl UploadOptions {
    /// Upload into a fresh per-request subfolder, so concurrent jobs that
    /// send the same client filename never share a file.
    pub fn isolated() -> Self {
        Self {
            subfolder: Some(uuid::Uuid::new_v4().simple().to_string()),
            overwrite: true,
        }
    }
}

/// `/history/{prompt_id}` body: prompt id to record.
pub type HistoryResponse = HashMap<String, HistoryRecord>;

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, malformed
    /// JSON body, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance. Every request is
    /// bounded by the configured HTTP and connect timeouts.
    pub fn new(config: &ComfyUIConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to an HTTP client without timeouts");
                reqwest::Client::new()
            });
        Self::with_client(client, config)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, config: &ComfyUIConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            auth: config.auth.clone(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends `POST /prompt` with the graph and client ID. Returns the
    /// server-assigned `prompt_id`.
    pub async fn submit_workflow(
        &self,
        workflow: &WorkflowGraph,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .authorized(self.client.post(format!("{}/prompt", self.api_url)))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends `GET /history/{prompt_id}`. The map is empty (or lacks the
    /// id) while the prompt is still queued or running.
    pub async fn get_history(&self, prompt_id: &str) -> Result<HistoryResponse, ComfyUIApiError> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/history/{}", self.api_url, prompt_id)),
            )
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Upload an image into the engine's input folder.
    ///
    /// Sends a multipart `POST /upload/image` with the file in the
    /// `image` field plus the optional `subfolder` / `overwrite` fields.
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        options: &UploadOptions,
    ) -> Result<UploadResponse, ComfyUIApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(guess_image_mime(filename))?;

        let mut form = reqwest::multipart::Form::new().part("image", part);
        if options.overwrite {
            form = form.text("overwrite", "true");
        }
        if let Some(subfolder) = options.subfolder.as_deref().filter(|s| !s.is_empty()) {
            form = form.text("subfolder", subfolder.to_string());
        }

        let response = self
            .authorized(self.client.post(format!("{}/upload/image", self.api_url)))
            .multipart(form)
            .send()
            .await?;

        let uploaded: UploadResponse = Self::parse_response(response).await?;
        tracing::debug!(path = %uploaded.path(), "Image uploaded to ComfyUI");
        Ok(uploaded)
    }

    /// Download the raw bytes of an output image via `GET /view`.
    pub async fn view_image(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError> {
        let response = self
            .authorized(self.client.get(format!("{}/view", self.api_url)))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.folder_type.as_str()),
            ])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(auth) => builder.header(AUTHORIZATION, auth.header_value()),
            None => builder,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl HistoryProbe for ComfyUIApi {
    async fn job_finished(&self, prompt_id: &str) -> Result<bool, ComfyUIApiError> {
        let history = self.get_history(prompt_id).await?;
        Ok(history
            .get(prompt_id)
            .is_some_and(HistoryRecord::has_outputs))
    }
}

fn guess_image_mime(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

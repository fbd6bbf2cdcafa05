//! In-memory [`GenerationEngine`] for flow tests.

use std::sync::Mutex;

use async_trait::async_trait;
use kvgen_comfyui::api::{UploadOptions, UploadResponse};
use kvgen_comfyui::error::EngineError;
use kvgen_comfyui::fetcher::FetchedImage;
use kvgen_comfyui::history::{FetchError, ImageRef};
use kvgen_comfyui::messages::ExecutedData;
use kvgen_comfyui::session::{CompletedJob, GenerationEngine, JobHandle};
use kvgen_comfyui::waiter::{CompletionCriterion, CompletionSource, WaitError, WaitOutcome};
use kvgen_core::workflow::WorkflowGraph;

#[derive(Default)]
pub struct FakeEngine {
    text: Option<String>,
    images: Vec<(String, Vec<u8>)>,
    executed: Vec<ExecutedData>,
    fail_upload: bool,
    fail_execute: Mutex<Option<WaitError>>,
    submitted: Mutex<Vec<WorkflowGraph>>,
    text_requests: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_image(mut self, node_id: &str, bytes: &[u8]) -> Self {
        self.images.push((node_id.to_string(), bytes.to_vec()));
        self
    }

    /// Report an `executed` frame with `text` for `node_id` in the wait
    /// outcome.
    pub fn with_executed_text(mut self, node_id: &str, text: &str) -> Self {
        self.executed.push(ExecutedData {
            node: node_id.to_string(),
            output: serde_json::json!({ "text": [text] }),
            prompt_id: Some("prompt-1".into()),
        });
        self
    }

    pub fn failing_upload(mut self) -> Self {
        self.fail_upload = true;
        self
    }

    pub fn failing_execute(self, error: WaitError) -> Self {
        *self.fail_execute.lock().unwrap() = Some(error);
        self
    }

    pub fn submitted(&self) -> Vec<WorkflowGraph> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn text_requests(&self) -> Vec<String> {
        self.text_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationEngine for FakeEngine {
    async fn upload_image(
        &self,
        _bytes: Vec<u8>,
        filename: &str,
        options: &UploadOptions,
    ) -> Result<UploadResponse, EngineError> {
        if self.fail_upload {
            return Err(kvgen_comfyui::api::ComfyUIApiError::ApiError {
                status: 500,
                body: "disk full".into(),
            }
            .into());
        }
        Ok(UploadResponse {
            name: filename.to_string(),
            subfolder: options.subfolder.clone().unwrap_or_default(),
            folder_type: Some("input".to_string()),
        })
    }

    async fn execute(
        &self,
        workflow: &WorkflowGraph,
        _criterion: &CompletionCriterion,
    ) -> Result<CompletedJob, EngineError> {
        if let Some(error) = self.fail_execute.lock().unwrap().take() {
            return Err(error.into());
        }
        self.submitted.lock().unwrap().push(workflow.clone());
        Ok(CompletedJob {
            handle: JobHandle {
                prompt_id: "prompt-1".into(),
                client_id: "client-1".into(),
            },
            outcome: WaitOutcome {
                source: CompletionSource::TerminalEvent,
                executed: self.executed.clone(),
            },
        })
    }

    async fn fetch_text(&self, job: &JobHandle, node_id: &str) -> Result<String, EngineError> {
        self.text_requests.lock().unwrap().push(node_id.to_string());
        self.text.clone().ok_or_else(|| {
            FetchError::NoResult {
                prompt_id: job.prompt_id.clone(),
                detail: format!("node {node_id} produced no text"),
            }
            .into()
        })
    }

    async fn fetch_images(
        &self,
        job: &JobHandle,
        _node_id: Option<&str>,
    ) -> Result<Vec<FetchedImage>, EngineError> {
        if self.images.is_empty() {
            return Err(FetchError::NoResult {
                prompt_id: job.prompt_id.clone(),
                detail: "no node produced images".into(),
            }
            .into());
        }
        Ok(self
            .images
            .iter()
            .enumerate()
            .map(|(i, (node, bytes))| FetchedImage {
                node_id: node.clone(),
                image: ImageRef {
                    filename: format!("ComfyUI_{i:05}_.png"),
                    subfolder: String::new(),
                    folder_type: "output".into(),
                },
                bytes: bytes.clone(),
            })
            .collect())
    }
}

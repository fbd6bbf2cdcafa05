//! One-job-at-a-time engine session.
//!
//! [`ComfyUISession`] runs the whole queue / await / fetch handshake for
//! a workflow. Every [`GenerationEngine::execute`] call opens its own
//! WebSocket channel under a fresh client ID, submits the graph with
//! that ID, waits for completion and closes the channel again, so two
//! concurrent jobs never share a channel.

use async_trait::async_trait;
use kvgen_core::workflow::WorkflowGraph;

use crate::api::{ComfyUIApi, UploadOptions, UploadResponse};
use crate::client::ComfyUIClient;
use crate::config::ComfyUIConfig;
use crate::error::EngineError;
use crate::fetcher::{FetchedImage, ResultFetcher};
use crate::waiter::{wait_for_completion, CompletionCriterion, WaitConfig, WaitOutcome};

/// Identifies one submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub prompt_id: String,
    pub client_id: String,
}

/// A job that reached completion and is ready to fetch.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub handle: JobHandle,
    pub outcome: WaitOutcome,
}

/// The operations the request flows need from a workflow engine.
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    /// Push an input image; returns the engine's canonical reference.
    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        options: &UploadOptions,
    ) -> Result<UploadResponse, EngineError>;

    /// Submit `workflow` and wait until it completes per `criterion`.
    async fn execute(
        &self,
        workflow: &WorkflowGraph,
        criterion: &CompletionCriterion,
    ) -> Result<CompletedJob, EngineError>;

    /// Text output of one node of a completed job.
    async fn fetch_text(&self, job: &JobHandle, node_id: &str) -> Result<String, EngineError>;

    /// Images of one node (or all nodes) of a completed job.
    async fn fetch_images(
        &self,
        job: &JobHandle,
        node_id: Option<&str>,
    ) -> Result<Vec<FetchedImage>, EngineError>;
}

/// Live [`GenerationEngine`] backed by one ComfyUI instance.
#[derive(Clone)]
pub struct ComfyUISession {
    api: ComfyUIApi,
    client: ComfyUIClient,
    wait: WaitConfig,
}

impl ComfyUISession {
    pub fn new(config: &ComfyUIConfig) -> Self {
        Self {
            api: ComfyUIApi::new(config),
            client: ComfyUIClient::new(config),
            wait: config.wait.clone(),
        }
    }

    pub fn api(&self) -> &ComfyUIApi {
        &self.api
    }
}

#[async_trait]
impl GenerationEngine for ComfyUISession {
    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        options: &UploadOptions,
    ) -> Result<UploadResponse, EngineError> {
        Ok(self.api.upload_image(bytes, filename, options).await?)
    }

    async fn execute(
        &self,
        workflow: &WorkflowGraph,
        criterion: &CompletionCriterion,
    ) -> Result<CompletedJob, EngineError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let mut connection = self.client.connect(&client_id).await?;

        let submitted = match self.api.submit_workflow(workflow, &client_id).await {
            Ok(submitted) => submitted,
            Err(e) => {
                connection.close().await;
                return Err(e.into());
            }
        };

        tracing::info!(
            client_id = %client_id,
            prompt_id = %submitted.prompt_id,
            queue_number = ?submitted.number,
            "Workflow submitted to ComfyUI",
        );

        let waited = wait_for_completion(
            &mut connection.ws_stream,
            &submitted.prompt_id,
            criterion,
            &self.api,
            &self.wait,
        )
        .await;
        connection.close().await;

        Ok(CompletedJob {
            handle: JobHandle {
                prompt_id: submitted.prompt_id,
                client_id,
            },
            outcome: waited?,
        })
    }

    async fn fetch_text(&self, job: &JobHandle, node_id: &str) -> Result<String, EngineError> {
        Ok(ResultFetcher::new(&self.api)
            .text(&job.prompt_id, node_id)
            .await?)
    }

    async fn fetch_images(
        &self,
        job: &JobHandle,
        node_id: Option<&str>,
    ) -> Result<Vec<FetchedImage>, EngineError> {
        Ok(ResultFetcher::new(&self.api)
            .images(&job.prompt_id, node_id)
            .await?)
    }
}

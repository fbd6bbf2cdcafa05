#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use kvgen_cloud::{GenerationStore, StorageError};
use kvgen_comfyui::api::{UploadOptions, UploadResponse};
use kvgen_comfyui::client::ComfyUIClientError;
use kvgen_comfyui::error::EngineError;
use kvgen_comfyui::fetcher::FetchedImage;
use kvgen_comfyui::history::{FetchError, ImageRef};
use kvgen_comfyui::session::{CompletedJob, GenerationEngine, JobHandle};
use kvgen_comfyui::waiter::{CompletionCriterion, CompletionSource, WaitError, WaitOutcome};
use kvgen_core::metadata::GenerationMetadata;
use kvgen_core::templates::WorkflowTemplates;
use kvgen_core::workflow::WorkflowGraph;
use kvgen_llm::{ChatCompletion, ChatRequest, LlmError};
use tower::ServiceExt;

use kvgen_api::config::ServerConfig;
use kvgen_api::router::build_app_router;
use kvgen_api::state::AppState;

pub const BOUNDARY: &str = "kvgen-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 1024 * 1024,
        workflow_dir: None,
    }
}

/// State around `engine` with the built-in templates and no chat or
/// storage backend.
pub fn test_state(engine: Arc<FakeEngine>) -> AppState {
    AppState {
        engine,
        templates: Arc::new(WorkflowTemplates::builtin()),
        chat: None,
        store: None,
    }
}

/// Full application router, same middleware stack as production.
pub fn build_test_app(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn delete(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// One multipart part: `(name, filename, content)`.
pub type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn expect_status(response: Response, status: StatusCode) -> serde_json::Value {
    assert_eq!(response.status(), status);
    body_json(response).await
}

// ---------------------------------------------------------------------------
// Fake backends
// ---------------------------------------------------------------------------

/// How [`FakeEngine::execute`] fails, when it does.
pub enum ExecuteFailure {
    Wait(WaitError),
    Unreachable,
}

#[derive(Default)]
pub struct FakeEngine {
    text: Option<String>,
    images: Vec<(String, Vec<u8>)>,
    failure: Mutex<Option<ExecuteFailure>>,
    uploads: Mutex<Vec<String>>,
    submitted: Mutex<Vec<WorkflowGraph>>,
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

    pub fn failing(self, failure: ExecuteFailure) -> Self {
        *self.failure.lock().unwrap() = Some(failure);
        self
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<WorkflowGraph> {
        self.submitted.lock().unwrap().clone()
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
        self.uploads.lock().unwrap().push(filename.to_string());
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
        match self.failure.lock().unwrap().take() {
            Some(ExecuteFailure::Wait(error)) => return Err(error.into()),
            Some(ExecuteFailure::Unreachable) => {
                return Err(ComfyUIClientError::Connection("Connection refused".into()).into())
            }
            None => {}
        }
        self.submitted.lock().unwrap().push(workflow.clone());
        Ok(CompletedJob {
            handle: JobHandle {
                prompt_id: "prompt-1".into(),
                client_id: "client-1".into(),
            },
            outcome: WaitOutcome {
                source: CompletionSource::TerminalEvent,
                executed: Vec::new(),
            },
        })
    }

    async fn fetch_text(&self, job: &JobHandle, node_id: &str) -> Result<String, EngineError> {
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

/// Chat backend that echoes the prompt, or fails with a fixed status.
pub struct EchoChat {
    pub fail_status: Option<u16>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl EchoChat {
    pub fn new() -> Self {
        Self {
            fail_status: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatCompletion for EchoChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.fail_status {
            Some(status) => Err(LlmError::Api {
                status,
                message: "upstream failure".into(),
            }),
            None => Ok(format!("echo: {}", request.prompt)),
        }
    }
}

/// Storage backend keeping uploads and metadata rows in memory.
#[derive(Default)]
pub struct MemoryStore {
    pub uploads: Mutex<Vec<String>>,
    pub rows: Mutex<Vec<GenerationMetadata>>,
    pub deleted: Mutex<Vec<String>>,
    pub list_limits: Mutex<Vec<u32>>,
    pub reject_uploads: bool,
}

impl MemoryStore {
    /// Store with `filenames` already saved under ids 1, 2, ...
    pub fn with_rows(filenames: &[&str]) -> Self {
        let store = Self::default();
        for filename in filenames {
            store.rows.lock().unwrap().push(GenerationMetadata {
                filename: filename.to_string(),
                prompt: "a jar".into(),
                negative_prompt: String::new(),
                style: "Life Style".into(),
                product: "Nescafe Gold".into(),
                resolution: "1280x1024".into(),
                lora_model: "NCMocha.safetensors".into(),
                generated_at: chrono::Utc::now(),
                image_url: format!("https://store.test/public/output/{filename}"),
                seed: 42,
                node_id: "9".into(),
            });
        }
        store
    }
}

#[async_trait]
impl GenerationStore for MemoryStore {
    async fn upload_image(&self, _bytes: Vec<u8>, filename: &str) -> Result<String, StorageError> {
        if self.reject_uploads {
            return Err(StorageError::Api {
                status: 403,
                body: "bucket is read-only".into(),
            });
        }
        self.uploads.lock().unwrap().push(filename.to_string());
        Ok(format!("https://store.test/public/output/{filename}"))
    }

    async fn save_metadata(
        &self,
        metadata: &GenerationMetadata,
    ) -> Result<serde_json::Value, StorageError> {
        self.rows.lock().unwrap().push(metadata.clone());
        Ok(serde_json::json!({ "id": self.rows.lock().unwrap().len(), "filename": metadata.filename }))
    }

    async fn list_generations(&self, limit: u32) -> Result<Vec<serde_json::Value>, StorageError> {
        self.list_limits.lock().unwrap().push(limit);
        let deleted = self.deleted.lock().unwrap().clone();
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .enumerate()
            .rev()
            .map(|(i, row)| ((i + 1).to_string(), row))
            .filter(|(id, _)| !deleted.contains(id))
            .take(limit as usize)
            .map(|(id, row)| serde_json::json!({ "id": id, "filename": row.filename }))
            .collect())
    }

    async fn delete_generation(&self, id: &str) -> Result<bool, StorageError> {
        let known = id
            .parse::<usize>()
            .is_ok_and(|n| n >= 1 && n <= self.rows.lock().unwrap().len());
        let mut deleted = self.deleted.lock().unwrap();
        if !known || deleted.iter().any(|d| d == id) {
            return Ok(false);
        }
        deleted.push(id.to_string());
        Ok(true)
    }
}


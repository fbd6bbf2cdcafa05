use std::sync::Arc;

use kvgen_cloud::GenerationStore;
use kvgen_comfyui::session::GenerationEngine;
use kvgen_core::templates::WorkflowTemplates;
use kvgen_llm::ChatCompletion;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Workflow engine every generation request runs on.
    pub engine: Arc<dyn GenerationEngine>,
    /// Workflow graphs, built-in or loaded from `WORKFLOW_DIR`.
    pub templates: Arc<WorkflowTemplates>,
    /// Chat completion; `None` when no API key is configured.
    pub chat: Option<Arc<dyn ChatCompletion>>,
    /// Image persistence; `None` when storage is not configured.
    pub store: Option<Arc<dyn GenerationStore>>,
}

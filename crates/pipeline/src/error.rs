use kvgen_cloud::StorageError;
use kvgen_comfyui::error::EngineError;
use kvgen_core::error::CoreError;

use crate::steps::StepRecord;

/// What went wrong underneath a failed flow.
#[derive(Debug, thiserror::Error)]
pub enum FlowFailure {
    /// Bad request parameters or a template that does not fit them.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A failed flow, with the steps it ran before stopping.
#[derive(Debug, thiserror::Error)]
#[error("{context}: {failure}")]
pub struct PipelineError {
    /// Short description of the failing stage, e.g. "Image upload failed".
    pub context: &'static str,
    #[source]
    pub failure: FlowFailure,
    pub steps: Vec<StepRecord>,
}

impl PipelineError {
    pub fn new(
        context: &'static str,
        failure: impl Into<FlowFailure>,
        steps: Vec<StepRecord>,
    ) -> Self {
        Self {
            context,
            failure: failure.into(),
            steps,
        }
    }
}

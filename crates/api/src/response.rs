//! Success envelope shared by the generation routes.

use kvgen_pipeline::StepRecord;
use serde::Serialize;

/// `{ "success": true, ...payload, "steps": [...] }`.
///
/// The payload's fields are flattened next to `success`, so handlers
/// return plain structs and the wire shape stays the same across routes.
#[derive(Debug, Serialize)]
pub struct FlowResponse<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<StepRecord>>,
}

impl<T: Serialize> FlowResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            steps: None,
        }
    }

    pub fn with_steps(mut self, steps: Vec<StepRecord>) -> Self {
        self.steps = Some(steps);
        self
    }
}

//! Image → text prompt flow (captioning workflow).

use kvgen_comfyui::api::UploadOptions;
use kvgen_comfyui::session::GenerationEngine;
use kvgen_comfyui::waiter::CompletionCriterion;
use kvgen_core::templates::prompt_creator::{self, CaptionParams};
use kvgen_core::templates::{WorkflowKind, WorkflowTemplates};

use crate::error::PipelineError;
use crate::steps::{StepLog, StepRecord};

/// Tuning for [`prompt_from_image`].
#[derive(Debug, Clone, Default)]
pub struct PromptParams {
    pub caption: CaptionParams,
    pub completion: CompletionCriterion,
}

#[derive(Debug, Clone)]
pub struct PromptOutcome {
    pub prompt: String,
    pub steps: Vec<StepRecord>,
}

/// Upload `image`, run the captioning workflow on it and return the
/// text of its output node.
///
/// Steps: `upload_image`, `load_workflow`, `generate_prompt`.
pub async fn prompt_from_image(
    engine: &dyn GenerationEngine,
    templates: &WorkflowTemplates,
    image: Vec<u8>,
    filename: &str,
    params: &PromptParams,
) -> Result<PromptOutcome, PipelineError> {
    let mut log = StepLog::new();

    let uploaded = match log.track(
        "upload_image",
        engine
            .upload_image(image, filename, &UploadOptions::isolated())
            .await,
    ) {
        Ok(uploaded) => uploaded,
        Err(e) => return Err(PipelineError::new("Image upload failed", e, log.into_records())),
    };

    let graph = templates
        .load(WorkflowKind::PromptCreator)
        .and_then(|mut graph| {
            prompt_creator::apply(&mut graph, &uploaded.path(), &params.caption).map(|_| graph)
        });
    let graph = match log.track("load_workflow", graph) {
        Ok(graph) => graph,
        Err(e) => {
            return Err(PipelineError::new("Failed to load workflow", e, log.into_records()))
        }
    };

    let generated = async {
        let job = engine.execute(&graph, &params.completion).await?;
        // The executed frame can beat the history write.
        match job.outcome.text_output(prompt_creator::SHOW_TEXT_NODE) {
            Some(text) => Ok(text),
            None => {
                engine
                    .fetch_text(&job.handle, prompt_creator::SHOW_TEXT_NODE)
                    .await
            }
        }
    }
    .await;

    match log.track("generate_prompt", generated) {
        Ok(prompt) => {
            tracing::info!(chars = prompt.len(), "Prompt generated from image");
            Ok(PromptOutcome {
                prompt,
                steps: log.into_records(),
            })
        }
        Err(e) => Err(PipelineError::new(
            "Prompt generation failed",
            e,
            log.into_records(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use kvgen_comfyui::error::{EngineError, ErrorKind};
    use kvgen_comfyui::history::FetchError;
    use kvgen_comfyui::waiter::WaitError;
    use serde_json::json;

    use super::*;
    use crate::error::FlowFailure;
    use crate::testing::FakeEngine;

    #[tokio::test]
    async fn caption_flow_wires_upload_into_graph() {
        let engine = FakeEngine::new().with_text("a glass jar of coffee on a wooden table");
        let outcome = prompt_from_image(
            &engine,
            &WorkflowTemplates::builtin(),
            b"PNG".to_vec(),
            "jar.png",
            &PromptParams::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.prompt, "a glass jar of coffee on a wooden table");
        let names: Vec<_> = outcome.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["upload_image", "load_workflow", "generate_prompt"]);

        let submitted = engine.submitted();
        assert_eq!(submitted.len(), 1);
        let graph = &submitted[0];
        let image = graph
            .input(prompt_creator::LOAD_IMAGE_NODE, "image")
            .and_then(|v| v.as_str())
            .unwrap();
        assert!(image.ends_with("/jar.png"), "unexpected reference {image}");
        assert_eq!(
            graph.input(prompt_creator::PROMPT_GENERATOR_NODE, "caption_method"),
            Some(&json!("long_prompt"))
        );
        assert_eq!(engine.text_requests(), vec!["4".to_string()]);
    }

    #[tokio::test]
    async fn same_filename_gets_distinct_references() {
        let engine = FakeEngine::new().with_text("caption");
        for _ in 0..2 {
            prompt_from_image(
                &engine,
                &WorkflowTemplates::builtin(),
                b"PNG".to_vec(),
                "jar.png",
                &PromptParams::default(),
            )
            .await
            .unwrap();
        }

        let refs: Vec<_> = engine
            .submitted()
            .iter()
            .map(|g| g.input(prompt_creator::LOAD_IMAGE_NODE, "image").cloned())
            .collect();
        assert_eq!(refs.len(), 2);
        assert_ne!(refs[0], refs[1]);
    }

    #[tokio::test]
    async fn text_from_executed_frame_skips_history() {
        let engine = FakeEngine::new().with_executed_text(prompt_creator::SHOW_TEXT_NODE, "a jar in the sun");
        let params = PromptParams {
            completion: CompletionCriterion::NodeExecuted(prompt_creator::SHOW_TEXT_NODE.into()),
            ..PromptParams::default()
        };
        let outcome = prompt_from_image(
            &engine,
            &WorkflowTemplates::builtin(),
            b"PNG".to_vec(),
            "jar.png",
            &params,
        )
        .await
        .unwrap();

        assert_eq!(outcome.prompt, "a jar in the sun");
        assert!(engine.text_requests().is_empty());
    }

    #[tokio::test]
    async fn graph_without_load_image_node_fails_load_step() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(WorkflowKind::PromptCreator.file_name()),
            r#"{"4": {"class_type": "ShowText|pysssss", "inputs": {}}}"#,
        )
        .unwrap();
        let engine = FakeEngine::new().with_text("caption");

        let err = prompt_from_image(
            &engine,
            &WorkflowTemplates::with_override_dir(dir.path()),
            b"PNG".to_vec(),
            "jar.png",
            &PromptParams::default(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.context, "Failed to load workflow");
        let last = err.steps.last().unwrap();
        assert_eq!(last.name, "load_workflow");
        assert!(!last.success);
        assert!(engine.submitted().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_stops_after_first_step() {
        let engine = FakeEngine::new().failing_upload();
        let err = prompt_from_image(
            &engine,
            &WorkflowTemplates::builtin(),
            b"PNG".to_vec(),
            "jar.png",
            &PromptParams::default(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.context, "Image upload failed");
        assert_eq!(err.steps.len(), 1);
        assert!(!err.steps[0].success);
        assert!(engine.submitted().is_empty());
    }

    #[tokio::test]
    async fn missing_text_is_a_failure_not_an_empty_prompt() {
        let engine = FakeEngine::new();
        let err = prompt_from_image(
            &engine,
            &WorkflowTemplates::builtin(),
            b"PNG".to_vec(),
            "jar.png",
            &PromptParams::default(),
        )
        .await
        .unwrap_err();

        assert_matches!(
            err.failure,
            FlowFailure::Engine(EngineError::Fetch(FetchError::NoResult { .. }))
        );
        assert_eq!(err.steps.last().map(|s| s.success), Some(false));
    }

    #[tokio::test]
    async fn remote_error_is_surfaced_with_message() {
        let engine = FakeEngine::new().failing_execute(WaitError::RemoteExecution {
            message: "CUDA out of memory".into(),
            node_id: Some("1".into()),
        });
        let err = prompt_from_image(
            &engine,
            &WorkflowTemplates::builtin(),
            b"PNG".to_vec(),
            "jar.png",
            &PromptParams::default(),
        )
        .await
        .unwrap_err();

        assert_matches!(&err.failure, FlowFailure::Engine(e) if e.kind() == ErrorKind::RemoteExecution);
        assert!(err.to_string().contains("CUDA out of memory"));
    }
}

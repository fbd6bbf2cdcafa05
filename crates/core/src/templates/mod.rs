//! Workflow files and their node-id conventions.
//!
//! Each workflow file hard-codes which node carries which input (for
//! example node `"4"` is the text output of the prompt creator). Those
//! ids live here as named constants, one submodule per workflow, next
//! to the function that writes request parameters into the graph.
//!
//! The JSON files ship embedded in the binary. A template directory may
//! override any of them at runtime; every load returns a fresh graph.

pub mod flux_lora;
pub mod img2img;
pub mod prompt_creator;

use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::workflow::WorkflowGraph;

/// The workflow files this service knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowKind {
    /// Image captioning (MiniCPM-V prompt creator).
    PromptCreator,
    /// Flux GGUF text-to-image with a LoRA.
    FluxLora,
    /// Checkpoint image-to-image.
    Img2Img,
}

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 3] = [
        WorkflowKind::PromptCreator,
        WorkflowKind::FluxLora,
        WorkflowKind::Img2Img,
    ];

    /// File name looked up inside an override directory.
    pub fn file_name(self) -> &'static str {
        match self {
            WorkflowKind::PromptCreator => "prompt_creator.json",
            WorkflowKind::FluxLora => "flux_lora.json",
            WorkflowKind::Img2Img => "img2img.json",
        }
    }

    fn builtin_json(self) -> &'static str {
        match self {
            WorkflowKind::PromptCreator => include_str!("../../workflows/prompt_creator.json"),
            WorkflowKind::FluxLora => include_str!("../../workflows/flux_lora.json"),
            WorkflowKind::Img2Img => include_str!("../../workflows/img2img.json"),
        }
    }
}

/// Source of workflow graphs: built-in files, optionally overridden.
#[derive(Debug, Clone, Default)]
pub struct WorkflowTemplates {
    override_dir: Option<PathBuf>,
}

impl WorkflowTemplates {
    /// Templates that only use the embedded files.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Templates that prefer files found in `dir`.
    pub fn with_override_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: Some(dir.into()),
        }
    }

    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }

    /// Load a fresh copy of the graph for `kind`.
    pub fn load(&self, kind: WorkflowKind) -> Result<WorkflowGraph, CoreError> {
        if let Some(dir) = &self.override_dir {
            let path = dir.join(kind.file_name());
            if path.is_file() {
                return WorkflowGraph::load(&path);
            }
        }
        WorkflowGraph::from_json(kind.builtin_json())
    }
}

//! Request flows on top of the engine, storage and template crates.
//!
//! Every flow records the steps it ran in a [`steps::StepLog`] and hands
//! the log back with its result, or inside a [`error::PipelineError`]
//! when a step fails.

pub mod error;
pub mod generate;
pub mod persist;
pub mod prompt;
pub mod steps;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{FlowFailure, PipelineError};
pub use generate::{generate_flux_lora, generate_img2img, GenerationOutcome};
pub use persist::{persist_generation, PersistContext, PersistReport};
pub use prompt::{prompt_from_image, PromptOutcome, PromptParams};
pub use steps::{StepLog, StepRecord};

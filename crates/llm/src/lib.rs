//! Chat-completion client for OpenAI-compatible endpoints.

pub mod client;
pub mod config;
pub mod error;

pub use client::{ChatCompletion, ChatRequest, OpenAiChat};
pub use config::LlmConfig;
pub use error::LlmError;

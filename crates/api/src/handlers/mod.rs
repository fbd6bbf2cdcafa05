pub mod generation;
pub mod images;
pub mod input;
pub mod llm;

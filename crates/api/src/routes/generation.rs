//! Route definitions for the generation and chat endpoints.
//!
//! Mounted at the root, matching the paths existing clients call.
//!
//! ```text
//! POST /generate_prompt       image -> caption
//! POST /generate_flux_lora    text -> images
//! POST /generate_img2img      image + text -> images
//! POST /run_llm               chat completion
//! ```

use axum::routing::post;
use axum::Router;

use crate::handlers::{generation, llm};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate_prompt", post(generation::generate_prompt))
        .route("/generate_flux_lora", post(generation::generate_flux_lora))
        .route("/generate_img2img", post(generation::generate_img2img))
        .route("/run_llm", post(llm::run_llm))
}

//! Routes over persisted generations.
//!
//! ```text
//! GET    /images          list stored records
//! DELETE /images/{id}     delete one record and its image
//! ```

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::images;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images", get(images::list_images))
        .route("/images/{id}", delete(images::delete_image))
}

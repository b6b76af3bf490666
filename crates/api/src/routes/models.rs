use axum::routing::{get, post};
use axum::Router;

use crate::handlers::models;
use crate::state::AppState;

/// Routes mounted at `/models`.
///
/// ```text
/// GET    /                 list_models
/// POST   /deploy           deploy_model (multipart)
/// GET    /{id}             get_model
/// DELETE /{id}             delete_model
/// POST   /{id}/toggle      toggle_model
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(models::list_models))
        .route("/deploy", post(models::deploy_model))
        .route("/{id}", get(models::get_model).delete(models::delete_model))
        .route("/{id}/toggle", post(models::toggle_model))
}

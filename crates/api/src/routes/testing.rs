use axum::routing::{get, post};
use axum::Router;

use crate::handlers::testing;
use crate::state::AppState;

/// Test routes, mounted directly under `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/test/{id}", post(testing::run_test))
        .route("/test-results", get(testing::list_results))
}

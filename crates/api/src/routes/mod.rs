pub mod analytics;
pub mod health;
pub mod models;
pub mod testing;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /models                       list
/// /models/deploy                deploy (POST, multipart)
/// /models/{id}                  get, delete
/// /models/{id}/toggle           start or stop (POST)
///
/// /test/{id}                    run test batch (POST, multipart)
/// /test-results                 list all results
///
/// /analytics                    platform summary
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/models", models::router())
        .merge(testing::router())
        .merge(analytics::router())
}

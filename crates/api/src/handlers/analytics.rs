//! Handlers for platform analytics.

use axum::extract::State;
use axum::Json;
use modelbay_core::analytics::Analytics;

use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/analytics
///
/// Model counts plus accuracy, latency and success rate over all recorded
/// test results.
pub async fn get_analytics(State(state): State<AppState>) -> Json<DataResponse<Analytics>> {
    Json(DataResponse {
        data: state.service.analytics().await,
    })
}

//! Handlers for running test inputs against models and listing results.

use axum::extract::{Multipart, Path, State};
use axum::Json;
use modelbay_core::test_result::TestResult;
use modelbay_lifecycle::inference::TestInput;

use crate::error::{AppError, AppResult};
use crate::handlers::models::parse_model_id;
use crate::handlers::upload::{discard, store_field};
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying test inputs; may repeat.
const IMAGES_FIELD: &str = "images";

/// POST /api/test/{id}
///
/// Accepts a multipart form with one or more `images` files, sends each to
/// the running model in upload order, and returns one result per file.
pub async fn run_test(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<Vec<TestResult>>>> {
    let id = parse_model_id(&id)?;
    let store = state.service.artifacts();
    let mut inputs: Vec<TestInput> = Vec::new();

    loop {
        let next = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()));
        let field = match next {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                for input in &inputs {
                    discard(store, &input.path).await;
                }
                return Err(e);
            }
        };
        if field.name() != Some(IMAGES_FIELD) {
            continue;
        }
        match store_field(store, field, "image").await {
            Ok(stored) => inputs.push(TestInput::new(stored.filename, stored.path)),
            Err(e) => {
                for input in &inputs {
                    discard(store, &input.path).await;
                }
                return Err(e);
            }
        }
    }

    let paths: Vec<_> = inputs.iter().map(|i| i.path.clone()).collect();
    match state.service.run_test(id, inputs).await {
        Ok(results) => Ok(Json(DataResponse { data: results })),
        Err(e) => {
            // Rejected batches keep nothing on disk.
            for path in &paths {
                discard(store, path).await;
            }
            Err(e.into())
        }
    }
}

/// GET /api/test-results
///
/// Every recorded result, oldest first. Results of deleted models are kept.
pub async fn list_results(State(state): State<AppState>) -> Json<DataResponse<Vec<TestResult>>> {
    Json(DataResponse {
        data: state.service.list_results().await,
    })
}

//! Handlers for the `/models` resource.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use modelbay_core::model::{DeployRequest, Model};
use modelbay_core::types::ModelId;
use modelbay_lifecycle::service::DeleteReport;

use crate::error::{AppError, AppResult};
use crate::handlers::upload::{discard, store_field, StoredUpload};
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the build context.
const ARTIFACT_FIELD: &str = "dockerContainer";

/// Parse a model id path segment.
pub fn parse_model_id(raw: &str) -> AppResult<ModelId> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid model id \"{raw}\"")))
}

/// GET /api/models
pub async fn list_models(State(state): State<AppState>) -> Json<DataResponse<Vec<Model>>> {
    Json(DataResponse {
        data: state.service.list_models().await,
    })
}

/// GET /api/models/{id}
pub async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Model>>> {
    let model = state.service.get_model(parse_model_id(&id)?).await?;
    Ok(Json(DataResponse { data: model }))
}

/// Text fields of a deploy form. Missing fields fall back to the
/// [`DeployRequest`] defaults.
#[derive(Debug, Default)]
struct DeployFields {
    name: Option<String>,
    description: Option<String>,
    port: Option<String>,
    endpoint: Option<String>,
}

impl DeployFields {
    fn into_request(self, upload: &StoredUpload) -> AppResult<DeployRequest> {
        let mut request = DeployRequest::new(self.name.unwrap_or_default(), &upload.path);
        if let Some(description) = self.description {
            request = request.with_description(description);
        }
        if let Some(port) = self.port.filter(|p| !p.trim().is_empty()) {
            let port = port
                .trim()
                .parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid port \"{port}\"")))?;
            request = request.with_port(port);
        }
        if let Some(endpoint) = self.endpoint.filter(|e| !e.trim().is_empty()) {
            request = request.with_endpoint(endpoint.trim());
        }
        Ok(request)
    }
}

/// POST /api/models/deploy
///
/// Accepts a multipart form with a required `dockerContainer` file (a tar
/// build context) and optional `modelName`, `description`, `port` and
/// `endpoint` fields. The image is built before responding; the new model is
/// returned stopped.
pub async fn deploy_model(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<Model>>)> {
    let store = state.service.artifacts();
    let mut upload: Option<StoredUpload> = None;

    let fields = read_deploy_form(&state, multipart, &mut upload).await;

    let (fields, upload) = match (fields, upload) {
        (Ok(fields), Some(upload)) => (fields, upload),
        (Ok(_), None) => {
            return Err(AppError::BadRequest(format!(
                "Missing required '{ARTIFACT_FIELD}' file"
            )))
        }
        (Err(e), stored) => {
            if let Some(stored) = stored {
                discard(store, &stored.path).await;
            }
            return Err(e);
        }
    };

    let request = match fields.into_request(&upload) {
        Ok(request) => request,
        Err(e) => {
            discard(store, &upload.path).await;
            return Err(e);
        }
    };

    tracing::info!(
        name = %request.name,
        port = request.port,
        artifact_bytes = upload.bytes,
        "Deploy requested",
    );

    let model = state.service.deploy(request).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: model })))
}

async fn read_deploy_form(
    state: &AppState,
    mut multipart: Multipart,
    upload: &mut Option<StoredUpload>,
) -> AppResult<DeployFields> {
    let mut fields = DeployFields::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            ARTIFACT_FIELD => {
                if upload.is_some() {
                    return Err(AppError::BadRequest(format!(
                        "Only one '{ARTIFACT_FIELD}' file is accepted"
                    )));
                }
                *upload = Some(store_field(state.service.artifacts(), field, "model.tar").await?);
            }
            "modelName" => fields.name = Some(text(field).await?),
            "description" => fields.description = Some(text(field).await?),
            "port" => fields.port = Some(text(field).await?),
            "endpoint" => fields.endpoint = Some(text(field).await?),
            _ => {} // ignore unknown fields
        }
    }

    Ok(fields)
}

async fn text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// POST /api/models/{id}/toggle
///
/// Starts a stopped model or stops a running one.
pub async fn toggle_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Model>>> {
    let model = state.service.toggle(parse_model_id(&id)?).await?;
    Ok(Json(DataResponse { data: model }))
}

/// DELETE /api/models/{id}
///
/// Always succeeds for an existing model. Teardown failures are listed in
/// `cleanup_errors`.
pub async fn delete_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<DeleteReport>>> {
    let report = state.service.delete(parse_model_id(&id)?).await?;
    Ok(Json(DataResponse { data: report }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_uuid_ids() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(parse_model_id(&id.to_string()).unwrap(), id);
        assert_matches!(parse_model_id("42"), Err(AppError::BadRequest(_)));
    }

    fn upload() -> StoredUpload {
        StoredUpload {
            filename: "m.tar".into(),
            path: "/tmp/m.tar".into(),
            bytes: 1,
        }
    }

    #[test]
    fn blank_fields_use_defaults() {
        let fields = DeployFields {
            name: Some("detector".into()),
            description: None,
            port: Some(" ".into()),
            endpoint: Some(String::new()),
        };
        let request = fields.into_request(&upload()).unwrap();
        assert_eq!(request.port, 8080);
        assert_eq!(request.endpoint, "/predict");
    }

    #[test]
    fn non_numeric_port_is_bad_request() {
        let fields = DeployFields {
            port: Some("eighty".into()),
            ..Default::default()
        };
        assert_matches!(fields.into_request(&upload()), Err(AppError::BadRequest(_)));
    }
}

//! The deployable inference service entity and its deploy request.
//!
//! Container and image names are derived from the model id so that at most
//! one container and one image can exist per model.

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::{ModelId, Timestamp};

/// Port the backing container listens on when the operator omits one.
pub const DEFAULT_PORT: u16 = 8080;

/// Inference route used when the operator omits one.
pub const DEFAULT_ENDPOINT: &str = "/predict";

/// Prefix for container and image names.
pub const NAME_PREFIX: &str = "model-";

/// Tag applied to every built image.
pub const IMAGE_TAG: &str = "latest";

/// Maximum length of an endpoint path.
const MAX_ENDPOINT_LEN: usize = 256;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a model as observed by callers.
///
/// There are no transient `Starting`/`Stopping` states: start and stop are
/// all-or-nothing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Stopped,
    Running,
}

impl ModelStatus {
    /// The state a toggle moves to.
    pub fn flipped(self) -> Self {
        match self {
            Self::Stopped => Self::Running,
            Self::Running => Self::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Container name for a model, e.g. `model-<uuid>`.
pub fn container_name(id: ModelId) -> String {
    format!("{NAME_PREFIX}{id}")
}

/// Full image reference for a built image name, e.g. `model-<uuid>:latest`.
pub fn image_reference(image_name: &str) -> String {
    format!("{image_name}:{IMAGE_TAG}")
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A registered, testable inference service backed by one container image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: ModelId,
    pub name: String,
    pub description: String,
    pub status: ModelStatus,
    /// Image built from the artifact, `model-<id>:latest`.
    pub image_reference: String,
    /// Name of the container created on start, `model-<id>`.
    pub container_name: String,
    /// Port published 1:1 between host and container.
    pub port: u16,
    /// Path of the inference route inside the container.
    pub endpoint: String,
    /// Number of inputs tested against this model, failed attempts included.
    pub image_count: u64,
    /// Uploaded build context, owned by this model until deletion.
    pub artifact_path: PathBuf,
    /// Artifact size at deploy time (`0` if it could not be read).
    pub artifact_size_bytes: u64,
    pub created_at: Timestamp,
}

impl Model {
    /// Build a freshly deployed model record. New models are always stopped.
    pub fn new(
        id: ModelId,
        request: DeployRequest,
        image_reference: String,
        artifact_size_bytes: u64,
    ) -> Self {
        Self {
            id,
            name: request.name,
            description: request.description,
            status: ModelStatus::Stopped,
            image_reference,
            container_name: container_name(id),
            port: request.port,
            endpoint: request.endpoint,
            image_count: 0,
            artifact_path: request.artifact_path,
            artifact_size_bytes,
            created_at: Utc::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ModelStatus::Running
    }
}

// ---------------------------------------------------------------------------
// Deploy request
// ---------------------------------------------------------------------------

/// Operator input for a deploy.
///
/// Construct with [`DeployRequest::new`] and override the defaults with the
/// `with_*` builder methods.
#[derive(Debug, Clone, Validate)]
pub struct DeployRequest {
    #[validate(length(min = 1, max = 128, message = "name must be 1 to 128 characters"))]
    pub name: String,
    #[validate(length(max = 2048, message = "description must not exceed 2048 characters"))]
    pub description: String,
    #[validate(range(min = 1, message = "port must be between 1 and 65535"))]
    pub port: u16,
    pub endpoint: String,
    /// Location of the uploaded tar build context.
    pub artifact_path: PathBuf,
}

impl DeployRequest {
    pub fn new(name: impl Into<String>, artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            port: DEFAULT_PORT,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            artifact_path: artifact_path.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Check field constraints, returning a [`CoreError::Validation`] on the
    /// first problem found.
    pub fn check(&self) -> Result<(), CoreError> {
        Validate::validate(self).map_err(|e| CoreError::Validation(e.to_string()))?;
        validate_endpoint(&self.endpoint)
    }
}

/// An endpoint must be an absolute path without whitespace.
pub fn validate_endpoint(endpoint: &str) -> Result<(), CoreError> {
    if !endpoint.starts_with('/') {
        return Err(CoreError::Validation(format!(
            "endpoint must start with '/', got \"{endpoint}\""
        )));
    }
    if endpoint.len() > MAX_ENDPOINT_LEN {
        return Err(CoreError::Validation(format!(
            "endpoint must not exceed {MAX_ENDPOINT_LEN} characters"
        )));
    }
    if endpoint.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(
            "endpoint must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DeployRequest {
        DeployRequest::new("detector", "/tmp/uploads/context.tar")
    }

    #[test]
    fn flipped_is_an_involution() {
        assert_eq!(ModelStatus::Stopped.flipped(), ModelStatus::Running);
        assert_eq!(ModelStatus::Running.flipped(), ModelStatus::Stopped);
        assert_eq!(ModelStatus::Stopped.flipped().flipped(), ModelStatus::Stopped);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ModelStatus::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(
            serde_json::from_str::<ModelStatus>("\"stopped\"").unwrap(),
            ModelStatus::Stopped
        );
    }

    #[test]
    fn names_derive_from_id() {
        let id = uuid::uuid!("6f479fd1-d7eb-4ca0-b15e-e61743e561fd");
        assert_eq!(
            container_name(id),
            "model-6f479fd1-d7eb-4ca0-b15e-e61743e561fd"
        );
        assert_eq!(
            image_reference(&container_name(id)),
            "model-6f479fd1-d7eb-4ca0-b15e-e61743e561fd:latest"
        );
    }

    #[test]
    fn new_model_is_stopped_with_zero_count() {
        let id = uuid::Uuid::new_v4();
        let model = Model::new(id, request().with_port(9000), "img:latest".into(), 42);
        assert_eq!(model.status, ModelStatus::Stopped);
        assert_eq!(model.image_count, 0);
        assert_eq!(model.port, 9000);
        assert_eq!(model.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(model.container_name, container_name(id));
        assert_eq!(model.artifact_size_bytes, 42);
        assert!(!model.is_running());
    }

    #[test]
    fn defaults_match_source_behaviour() {
        let req = request();
        assert_eq!(req.port, 8080);
        assert_eq!(req.endpoint, "/predict");
        assert!(req.description.is_empty());
    }

    #[test]
    fn valid_request_passes() {
        assert!(request().with_description("cats and dogs").check().is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let req = DeployRequest::new("", "/tmp/a.tar");
        assert!(matches!(req.check(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn port_zero_rejected() {
        assert!(request().with_port(0).check().is_err());
    }

    #[test]
    fn relative_endpoint_rejected() {
        assert!(request().with_endpoint("predict").check().is_err());
    }

    #[test]
    fn endpoint_with_space_rejected() {
        assert!(validate_endpoint("/pre dict").is_err());
    }

    #[test]
    fn nested_endpoint_accepted() {
        assert!(validate_endpoint("/v1/models/detector:predict").is_ok());
    }
}

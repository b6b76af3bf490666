use modelbay_core::error::CoreError;
use modelbay_core::model::ModelStatus;
use modelbay_docker::builder::BuildError;
use modelbay_docker::controller::{StartError, StopError};

use crate::artifacts::ArtifactError;

/// Errors surfaced by [`ModelService`](crate::service::ModelService).
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Model {name} must be running to perform tests (status: {status})")]
    NotRunning { name: String, status: ModelStatus },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Start(#[from] StartError),

    #[error(transparent)]
    Stop(#[from] StopError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl LifecycleError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Core(CoreError::NotFound { .. }))
    }
}

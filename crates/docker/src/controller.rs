//! Per-model container lifecycle on top of a [`ContainerRuntime`].
//!
//! The controller holds no handles between calls. Every operation looks the
//! container up by its exact name first, so it always acts on the runtime's
//! current state.

use std::fmt;
use std::sync::Arc;

use modelbay_core::model::Model;
use serde::Serialize;

use crate::error::RuntimeError;
use crate::runtime::{ContainerFilter, ContainerRuntime, ContainerSpec, ContainerSummary};

/// A container started for a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// Another running model already publishes this host port.
    #[error("Port {port} is already in use by model \"{owner}\"")]
    PortInUse { port: u16, owner: String },

    #[error("Failed to clear stale container {name}: {source}")]
    Stale {
        name: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to create container {name}: {source}")]
    Create {
        name: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to start container {name}: {source}")]
    Start {
        name: String,
        #[source]
        source: RuntimeError,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to stop container {name}: {source}")]
pub struct StopError {
    pub name: String,
    #[source]
    pub source: RuntimeError,
}

/// Teardown step in a best-effort cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStep {
    StopContainer,
    RemoveContainer,
    RemoveImage,
    DeleteArtifact,
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StopContainer => "stop container",
            Self::RemoveContainer => "remove container",
            Self::RemoveImage => "remove image",
            Self::DeleteArtifact => "delete artifact",
        })
    }
}

/// A cleanup step that failed. Reported, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("Cleanup failed to {step} {resource}: {message}")]
pub struct CleanupError {
    pub step: CleanupStep,
    pub resource: String,
    pub message: String,
}

impl CleanupError {
    pub fn new(step: CleanupStep, resource: impl Into<String>, message: impl ToString) -> Self {
        Self {
            step,
            resource: resource.into(),
            message: message.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ContainerController {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerController {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Create and start the model's container.
    ///
    /// Any leftover container with the same name is force-removed first. If
    /// the container is created but fails to start it is removed again, so a
    /// failed start leaves nothing behind.
    pub async fn start(&self, model: &Model) -> Result<ContainerHandle, StartError> {
        let spec = ContainerSpec::for_model(model);
        let name = spec.name.clone();

        if let Some(stale) = self
            .find_container(&name, true)
            .await
            .map_err(|source| StartError::Stale {
                name: name.clone(),
                source,
            })?
        {
            tracing::info!(container = %name, state = %stale.state, "Removing stale container");
            self.runtime
                .remove_container(&stale.id, true)
                .await
                .or_else(ignore_not_found)
                .map_err(|source| StartError::Stale {
                    name: name.clone(),
                    source,
                })?;
        }

        let id = self
            .runtime
            .create_container(&spec)
            .await
            .map_err(|source| StartError::Create {
                name: name.clone(),
                source,
            })?;

        if let Err(source) = self.runtime.start_container(&id).await {
            if let Err(e) = self.runtime.remove_container(&id, true).await {
                tracing::warn!(
                    container = %name,
                    error = %e,
                    "Failed to remove container after failed start",
                );
            }
            return Err(StartError::Start { name, source });
        }

        tracing::info!(
            model_id = %model.id,
            container = %name,
            port = spec.port,
            "Container started",
        );

        Ok(ContainerHandle { id, name })
    }

    /// Stop the running container called `name`. A container that is not
    /// running (or does not exist) counts as stopped.
    pub async fn stop(&self, name: &str) -> Result<(), StopError> {
        let wrap = |source: RuntimeError| StopError {
            name: name.to_string(),
            source,
        };

        let Some(container) = self.find_container(name, false).await.map_err(wrap)? else {
            tracing::debug!(container = %name, "Container not running, nothing to stop");
            return Ok(());
        };

        self.runtime
            .stop_container(&container.id)
            .await
            .or_else(ignore_not_found)
            .map_err(wrap)?;

        tracing::info!(container = %name, "Container stopped");
        Ok(())
    }

    /// Force-remove the container called `name`, running or not.
    pub async fn remove(&self, name: &str) -> Result<(), CleanupError> {
        let fail = |e: RuntimeError| CleanupError::new(CleanupStep::RemoveContainer, name, e);

        let Some(container) = self.find_container(name, true).await.map_err(fail)? else {
            return Ok(());
        };

        self.runtime
            .remove_container(&container.id, true)
            .await
            .or_else(ignore_not_found)
            .map_err(fail)?;

        tracing::debug!(container = %name, "Container removed");
        Ok(())
    }

    /// Force-remove an image. A missing image counts as removed.
    pub async fn remove_image(&self, reference: &str) -> Result<(), CleanupError> {
        self.runtime
            .remove_image(reference, true)
            .await
            .or_else(ignore_not_found)
            .map_err(|e| CleanupError::new(CleanupStep::RemoveImage, reference, e))?;

        tracing::debug!(image = %reference, "Image removed");
        Ok(())
    }

    async fn find_container(
        &self,
        name: &str,
        all: bool,
    ) -> Result<Option<ContainerSummary>, RuntimeError> {
        let filter = if all {
            ContainerFilter::any_named(name)
        } else {
            ContainerFilter::running_named(name)
        };
        // The runtime's name filter may be a substring match; require an
        // exact one here.
        Ok(self
            .runtime
            .list_containers(&filter)
            .await?
            .into_iter()
            .find(|c| c.has_name(name)))
    }
}

fn ignore_not_found(e: RuntimeError) -> Result<(), RuntimeError> {
    if e.is_not_found() {
        Ok(())
    } else {
        Err(e)
    }
}

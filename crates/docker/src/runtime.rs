//! The container runtime interface consumed by the builder and controller.

use std::path::Path;

use async_trait::async_trait;
use modelbay_core::model::Model;
use serde::Serialize;

use crate::error::RuntimeError;

/// Everything needed to create a container for a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Exposed in the container and published on the same host port.
    pub port: u16,
}

impl ContainerSpec {
    pub fn for_model(model: &Model) -> Self {
        Self {
            name: model.container_name.clone(),
            image: model.image_reference.clone(),
            port: model.port,
        }
    }
}

/// Filter for [`ContainerRuntime::list_containers`].
#[derive(Debug, Clone, Default)]
pub struct ContainerFilter {
    /// Restrict to containers with exactly this name.
    pub name: Option<String>,
    /// Include stopped containers (`docker ps --all`).
    pub all: bool,
}

impl ContainerFilter {
    pub fn running_named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            all: false,
        }
    }

    pub fn any_named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            all: true,
        }
    }
}

/// One row of a container listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    pub id: String,
    /// Names as reported by the runtime; a leading `/` may be present.
    pub names: Vec<String>,
    /// Runtime state, e.g. `running`, `exited`, `created`.
    pub state: String,
}

impl ContainerSummary {
    /// Exact name match, ignoring the runtime's optional leading slash.
    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.trim_start_matches('/') == name)
    }

    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// External process manager that builds images and runs containers.
///
/// Implementations must not cache handles; every call reflects the
/// runtime's current state.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Build an image from a tar build context and tag it `tag`.
    async fn build_image(&self, context: &Path, tag: &str) -> Result<(), RuntimeError>;

    /// Create (but do not start) a container. Returns the container id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError>;

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), RuntimeError>;

    async fn remove_image(&self, reference: &str, force: bool) -> Result<(), RuntimeError>;

    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerSummary>, RuntimeError>;
}

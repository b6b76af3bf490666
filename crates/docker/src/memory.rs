//! In-process [`ContainerRuntime`] for local development and tests.
//!
//! Tracks images and containers in memory with the same observable rules as
//! a real engine: names are unique, a host port can be published by only
//! one running container, and removing a missing resource is `NotFound`.
//! Failures can be injected per [`Operation`], and every call is counted.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RuntimeError;
use crate::runtime::{ContainerFilter, ContainerRuntime, ContainerSpec, ContainerSummary};

/// Runtime operations, used for call counting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Build,
    Create,
    Start,
    Stop,
    RemoveContainer,
    RemoveImage,
    List,
}

#[derive(Debug, Clone)]
struct MemoryContainer {
    id: String,
    name: String,
    image: String,
    port: u16,
    running: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    images: HashSet<String>,
    containers: Vec<MemoryContainer>,
    failures: HashMap<Operation, String>,
    calls: HashMap<Operation, usize>,
}

#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    state: Mutex<MemoryState>,
    /// Simulated latency applied before every operation.
    latency: Duration,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every subsequent `op` fail with `message` until cleared.
    pub fn fail(&self, op: Operation, message: impl Into<String>) {
        self.lock().failures.insert(op, message.into());
    }

    pub fn clear_failure(&self, op: Operation) {
        self.lock().failures.remove(&op);
    }

    /// Number of times `op` has been invoked, failed calls included.
    pub fn calls(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn has_image(&self, reference: &str) -> bool {
        self.lock().images.contains(reference)
    }

    /// Names of all containers, running or not.
    pub fn container_names(&self) -> Vec<String> {
        self.lock().containers.iter().map(|c| c.name.clone()).collect()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.lock()
            .containers
            .iter()
            .any(|c| c.name == name && c.running)
    }

    /// Register an image directly, as if it had been built earlier.
    pub fn seed_image(&self, reference: impl Into<String>) {
        self.lock().images.insert(reference.into());
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call, wait out the simulated latency, then apply any
    /// injected failure.
    async fn enter(&self, op: Operation) -> Result<(), RuntimeError> {
        *self.lock().calls.entry(op).or_insert(0) += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.lock().failures.get(&op) {
            Some(message) => Err(RuntimeError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

impl MemoryState {
    fn find_mut(&mut self, id_or_name: &str) -> Option<&mut MemoryContainer> {
        self.containers
            .iter_mut()
            .find(|c| c.id == id_or_name || c.name == id_or_name)
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    async fn build_image(&self, context: &Path, tag: &str) -> Result<(), RuntimeError> {
        self.enter(Operation::Build).await?;

        let len = tokio::fs::metadata(context)
            .await
            .map_err(|source| RuntimeError::Context {
                path: context.to_path_buf(),
                source,
            })?
            .len();
        if len == 0 {
            return Err(RuntimeError::CommandFailed {
                operation: "build".into(),
                exit_code: 1,
                stderr: "unexpected EOF in build context".into(),
            });
        }

        self.lock().images.insert(tag.to_string());
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        self.enter(Operation::Create).await?;
        let mut state = self.lock();

        if !state.images.contains(&spec.image) {
            return Err(RuntimeError::NotFound(format!("image {}", spec.image)));
        }
        if state.containers.iter().any(|c| c.name == spec.name) {
            return Err(RuntimeError::CommandFailed {
                operation: "create".into(),
                exit_code: 125,
                stderr: format!("container name \"/{}\" is already in use", spec.name),
            });
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        state.containers.push(MemoryContainer {
            id: id.clone(),
            name: spec.name.clone(),
            image: spec.image.clone(),
            port: spec.port,
            running: false,
        });
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.enter(Operation::Start).await?;
        let mut state = self.lock();

        let (port, own_id) = match state.find_mut(id) {
            Some(c) => (c.port, c.id.clone()),
            None => return Err(RuntimeError::NotFound(format!("container {id}"))),
        };
        if state
            .containers
            .iter()
            .any(|c| c.running && c.port == port && c.id != own_id)
        {
            return Err(RuntimeError::CommandFailed {
                operation: "start".into(),
                exit_code: 125,
                stderr: format!("Bind for 0.0.0.0:{port} failed: port is already allocated"),
            });
        }
        if let Some(c) = state.find_mut(id) {
            c.running = true;
        }
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.enter(Operation::Stop).await?;
        match self.lock().find_mut(id) {
            Some(c) => {
                c.running = false;
                Ok(())
            }
            None => Err(RuntimeError::NotFound(format!("container {id}"))),
        }
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        self.enter(Operation::RemoveContainer).await?;
        let mut state = self.lock();
        let Some(pos) = state
            .containers
            .iter()
            .position(|c| c.id == id || c.name == id)
        else {
            return Err(RuntimeError::NotFound(format!("container {id}")));
        };
        if state.containers[pos].running && !force {
            return Err(RuntimeError::CommandFailed {
                operation: "rm".into(),
                exit_code: 1,
                stderr: "cannot remove a running container".into(),
            });
        }
        state.containers.remove(pos);
        Ok(())
    }

    async fn remove_image(&self, reference: &str, force: bool) -> Result<(), RuntimeError> {
        self.enter(Operation::RemoveImage).await?;
        let mut state = self.lock();
        if !state.images.contains(reference) {
            return Err(RuntimeError::NotFound(format!("image {reference}")));
        }
        if !force && state.containers.iter().any(|c| c.image == reference) {
            return Err(RuntimeError::CommandFailed {
                operation: "rmi".into(),
                exit_code: 1,
                stderr: format!("image {reference} is being used by a container"),
            });
        }
        state.images.remove(reference);
        Ok(())
    }

    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerSummary>, RuntimeError> {
        self.enter(Operation::List).await?;
        Ok(self
            .lock()
            .containers
            .iter()
            .filter(|c| filter.all || c.running)
            .filter(|c| filter.name.as_deref().is_none_or(|n| n == c.name))
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                names: vec![format!("/{}", c.name)],
                state: if c.running { "running" } else { "exited" }.to_string(),
            })
            .collect())
    }
}

//! Boundary operations over the model lifecycle.
//!
//! Start, stop and delete for one model run under that model's transition
//! guard, so they never interleave. Operations on different models proceed
//! concurrently.

use std::sync::Arc;

use modelbay_core::analytics::{self, Analytics};
use modelbay_core::error::CoreError;
use modelbay_core::model::{container_name, DeployRequest, Model, ModelStatus};
use modelbay_core::test_result::TestResult;
use modelbay_core::types::ModelId;
use modelbay_docker::builder::ImageBuilder;
use modelbay_docker::controller::{CleanupError, CleanupStep, ContainerController, StartError};
use modelbay_docker::runtime::ContainerRuntime;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::artifacts::LocalArtifactStore;
use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::events::{EventBus, LifecycleEvent, LifecycleEventKind};
use crate::inference::{InferenceDispatcher, TestInput};
use crate::registry::ModelRegistry;
use crate::results::ResultLog;

/// Outcome of a delete: the removed model and any cleanup step that failed.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub model: Model,
    pub cleanup_errors: Vec<CleanupError>,
}

impl DeleteReport {
    pub fn is_clean(&self) -> bool {
        self.cleanup_errors.is_empty()
    }
}

pub struct ModelService {
    registry: ModelRegistry,
    results: ResultLog,
    artifacts: LocalArtifactStore,
    builder: ImageBuilder,
    controller: ContainerController,
    dispatcher: InferenceDispatcher,
    events: Arc<EventBus>,
}

impl ModelService {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        artifacts: LocalArtifactStore,
        dispatcher: InferenceDispatcher,
    ) -> Self {
        Self {
            registry: ModelRegistry::new(),
            results: ResultLog::new(),
            artifacts,
            builder: ImageBuilder::new(runtime.clone()),
            controller: ContainerController::new(runtime),
            dispatcher,
            events: Arc::new(EventBus::default()),
        }
    }

    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self::new(
            config.container_runtime(),
            LocalArtifactStore::new(&config.upload_dir),
            InferenceDispatcher::new(&config.inference_host, config.inference_timeout),
        )
    }

    pub fn artifacts(&self) -> &LocalArtifactStore {
        &self.artifacts
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Deploy
    // -----------------------------------------------------------------------

    /// Build the uploaded artifact into an image and register a stopped
    /// model for it.
    ///
    /// The artifact must already be in the store. If validation or the build
    /// fails, the artifact is deleted and nothing is registered.
    pub async fn deploy(&self, request: DeployRequest) -> Result<Model, LifecycleError> {
        if let Err(e) = request.check() {
            self.discard_artifact(&request).await;
            return Err(e.into());
        }

        let id = uuid::Uuid::new_v4();
        let reference = match self
            .builder
            .build(&request.artifact_path, &container_name(id))
            .await
        {
            Ok(reference) => reference,
            Err(e) => {
                self.discard_artifact(&request).await;
                return Err(e.into());
            }
        };

        let size = self.artifacts.size_of(&request.artifact_path).await;
        let model = Model::new(id, request, reference, size);
        self.registry.create(model.clone()).await?;

        tracing::info!(
            model_id = %model.id,
            name = %model.name,
            port = model.port,
            image = %model.image_reference,
            "Model deployed",
        );
        self.publish(&model, LifecycleEventKind::Deployed);

        Ok(model)
    }

    async fn discard_artifact(&self, request: &DeployRequest) {
        if let Err(e) = self.artifacts.delete(&request.artifact_path).await {
            tracing::warn!(error = %e, "Failed to discard artifact of rejected deploy");
        }
    }

    // -----------------------------------------------------------------------
    // Start / stop / toggle
    // -----------------------------------------------------------------------

    /// Flip the model between stopped and running.
    ///
    /// The target is decided from the status seen on arrival. A concurrent
    /// request that already reached that target makes this a no-op.
    pub async fn toggle(&self, id: ModelId) -> Result<Model, LifecycleError> {
        let target = self.registry.get(id).await?.status.flipped();
        self.transition(id, target).await
    }

    pub async fn start(&self, id: ModelId) -> Result<Model, LifecycleError> {
        self.transition(id, ModelStatus::Running).await
    }

    pub async fn stop(&self, id: ModelId) -> Result<Model, LifecycleError> {
        self.transition(id, ModelStatus::Stopped).await
    }

    async fn transition(&self, id: ModelId, target: ModelStatus) -> Result<Model, LifecycleError> {
        let guard = self.registry.lock(id).await?;
        let model = guard.model();
        if model.status == target {
            return Ok(model);
        }

        match target {
            ModelStatus::Running => {
                if let Some(owner) = self.registry.running_on_port(model.port, id).await {
                    return Err(StartError::PortInUse {
                        port: model.port,
                        owner: owner.name,
                    }
                    .into());
                }
                self.controller.start(&model).await?;
            }
            ModelStatus::Stopped => self.controller.stop(&model.container_name).await?,
        }

        let updated = guard.update(|m| m.status = target);
        tracing::info!(model_id = %id, status = %target, "Model status changed");
        self.publish(&updated, LifecycleEventKind::StatusChanged { status: target });
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    /// Tear down the model's container, image and artifact, then unregister
    /// it.
    ///
    /// Teardown is best effort. Each failed step is logged and reported in
    /// the returned [`DeleteReport`], but the model is removed regardless.
    pub async fn delete(&self, id: ModelId) -> Result<DeleteReport, LifecycleError> {
        let guard = self.registry.lock(id).await?;
        let model = guard.model();
        let mut cleanup_errors = Vec::new();

        if let Err(e) = self.controller.stop(&model.container_name).await {
            cleanup_errors.push(CleanupError::new(
                CleanupStep::StopContainer,
                &model.container_name,
                e.source,
            ));
        }
        if let Err(e) = self.controller.remove(&model.container_name).await {
            cleanup_errors.push(e);
        }
        if let Err(e) = self.controller.remove_image(&model.image_reference).await {
            cleanup_errors.push(e);
        }
        if let Err(e) = self.artifacts.delete(&model.artifact_path).await {
            cleanup_errors.push(CleanupError::new(
                CleanupStep::DeleteArtifact,
                model.artifact_path.display().to_string(),
                e,
            ));
        }

        let model = self.registry.remove(id).await?;
        drop(guard);

        for error in &cleanup_errors {
            tracing::warn!(model_id = %id, step = %error.step, error = %error, "Cleanup step failed");
            self.publish(
                &model,
                LifecycleEventKind::CleanupFailed {
                    error: error.clone(),
                },
            );
        }
        tracing::info!(
            model_id = %id,
            name = %model.name,
            cleanup_failures = cleanup_errors.len(),
            "Model deleted",
        );
        self.publish(&model, LifecycleEventKind::Deleted);

        Ok(DeleteReport {
            model,
            cleanup_errors,
        })
    }

    // -----------------------------------------------------------------------
    // Testing
    // -----------------------------------------------------------------------

    /// Send every input to the running model, in order, and record one result
    /// per input.
    ///
    /// The transition guard is not held while dispatching. If the model is
    /// deleted mid-batch the results are still recorded and returned.
    pub async fn run_test(
        &self,
        id: ModelId,
        inputs: Vec<TestInput>,
    ) -> Result<Vec<TestResult>, LifecycleError> {
        let model = self.registry.get(id).await?;
        if !model.is_running() {
            return Err(LifecycleError::NotRunning {
                name: model.name,
                status: model.status,
            });
        }
        if inputs.is_empty() {
            return Err(CoreError::Validation("No images uploaded for testing".into()).into());
        }

        let results = self.dispatcher.dispatch_batch(&model, &inputs).await;
        self.results.append_all(results.iter().cloned()).await;

        let tested = results.len() as u64;
        if let Err(e) = self
            .registry
            .update(id, |m| m.image_count = m.image_count.saturating_add(tested))
            .await
        {
            tracing::warn!(model_id = %id, error = %e, "Model removed during test, count not updated");
        }

        let completed = results.iter().filter(|r| r.is_completed()).count();
        tracing::info!(
            model_id = %id,
            inputs = results.len(),
            completed,
            "Test batch finished",
        );
        self.publish(
            &model,
            LifecycleEventKind::Tested {
                inputs: results.len(),
                completed,
            },
        );

        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn list_models(&self) -> Vec<Model> {
        self.registry.list().await
    }

    pub async fn get_model(&self, id: ModelId) -> Result<Model, LifecycleError> {
        Ok(self.registry.get(id).await?)
    }

    pub async fn list_results(&self) -> Vec<TestResult> {
        self.results.list().await
    }

    pub async fn analytics(&self) -> Analytics {
        let models = self.registry.list().await;
        let results = self.results.list().await;
        analytics::summarize(&models, &results)
    }

    fn publish(&self, model: &Model, kind: LifecycleEventKind) {
        self.events
            .publish(LifecycleEvent::new(model.id, &model.name, kind));
    }
}

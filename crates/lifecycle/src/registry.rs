//! Authoritative in-memory collection of models.
//!
//! The map lock is only held for lookups and inserts. Each model carries its
//! own transition mutex ([`ModelRegistry::lock`]) which lifecycle operations
//! hold across container I/O, and a short-lived record lock for reads and
//! updates.

use std::sync::{Arc, PoisonError, RwLock as StdRwLock};

use indexmap::IndexMap;
use modelbay_core::error::CoreError;
use modelbay_core::model::{Model, ModelStatus};
use modelbay_core::types::ModelId;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

struct ModelEntry {
    transition: Arc<Mutex<()>>,
    model: StdRwLock<Model>,
}

impl ModelEntry {
    fn snapshot(&self) -> Model {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn apply(&self, f: impl FnOnce(&mut Model)) -> Model {
        let mut model = self.model.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut model);
        model.clone()
    }
}

/// Exclusive right to transition one model. Dropping it releases the model
/// to the next waiter.
pub struct TransitionGuard {
    entry: Arc<ModelEntry>,
    _guard: OwnedMutexGuard<()>,
}

impl TransitionGuard {
    /// The model as of now.
    pub fn model(&self) -> Model {
        self.entry.snapshot()
    }

    /// Apply `f` atomically and return the updated model.
    pub fn update(&self, f: impl FnOnce(&mut Model)) -> Model {
        self.entry.apply(f)
    }
}

#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<IndexMap<ModelId, Arc<ModelEntry>>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new model. Fails with `Conflict` if the id is taken.
    pub async fn create(&self, model: Model) -> Result<ModelId, CoreError> {
        let id = model.id;
        let mut models = self.models.write().await;
        if models.contains_key(&id) {
            return Err(CoreError::Conflict(format!("model {id} already exists")));
        }
        models.insert(
            id,
            Arc::new(ModelEntry {
                transition: Arc::new(Mutex::new(())),
                model: StdRwLock::new(model),
            }),
        );
        Ok(id)
    }

    pub async fn get(&self, id: ModelId) -> Result<Model, CoreError> {
        Ok(self.entry(id).await?.snapshot())
    }

    /// All models in deploy order.
    pub async fn list(&self) -> Vec<Model> {
        self.models
            .read()
            .await
            .values()
            .map(|e| e.snapshot())
            .collect()
    }

    /// Apply `f` to the model atomically and return the result.
    pub async fn update(
        &self,
        id: ModelId,
        f: impl FnOnce(&mut Model),
    ) -> Result<Model, CoreError> {
        Ok(self.entry(id).await?.apply(f))
    }

    /// Remove the model and return its last state.
    pub async fn remove(&self, id: ModelId) -> Result<Model, CoreError> {
        self.models
            .write()
            .await
            .shift_remove(&id)
            .map(|e| e.snapshot())
            .ok_or_else(|| CoreError::model_not_found(id))
    }

    /// Wait for exclusive transition rights on one model.
    ///
    /// Returns `NotFound` if the model does not exist, including when it was
    /// removed while this call was waiting.
    pub async fn lock(&self, id: ModelId) -> Result<TransitionGuard, CoreError> {
        let entry = self.entry(id).await?;
        let guard = entry.transition.clone().lock_owned().await;

        let still_registered = self
            .models
            .read()
            .await
            .get(&id)
            .is_some_and(|current| Arc::ptr_eq(current, &entry));
        if !still_registered {
            return Err(CoreError::model_not_found(id));
        }

        Ok(TransitionGuard {
            entry,
            _guard: guard,
        })
    }

    /// A running model other than `except` that publishes `port`.
    pub async fn running_on_port(&self, port: u16, except: ModelId) -> Option<Model> {
        self.models
            .read()
            .await
            .iter()
            .filter(|(id, _)| **id != except)
            .map(|(_, e)| e.snapshot())
            .find(|m| m.status == ModelStatus::Running && m.port == port)
    }

    async fn entry(&self, id: ModelId) -> Result<Arc<ModelEntry>, CoreError> {
        self.models
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::model_not_found(id))
    }
}

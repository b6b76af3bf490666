//! Model lifecycle orchestration.
//!
//! [`ModelService`](service::ModelService) implements the boundary
//! operations (deploy, toggle, delete, run test, listings) on top of the
//! [`ModelRegistry`](registry::ModelRegistry), the
//! [`ResultLog`](results::ResultLog), the
//! [`LocalArtifactStore`](artifacts::LocalArtifactStore), the
//! [`InferenceDispatcher`](inference::InferenceDispatcher) and the container
//! components from `modelbay-docker`.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod events;
pub mod inference;
pub mod registry;
pub mod results;
pub mod service;

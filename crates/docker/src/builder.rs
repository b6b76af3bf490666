//! Turns an uploaded build context into a tagged image.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use modelbay_core::model::image_reference;

use crate::error::RuntimeError;
use crate::runtime::ContainerRuntime;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Build context not found: {}", .0.display())]
    ContextMissing(PathBuf),

    #[error("Build context is empty: {}", .0.display())]
    EmptyContext(PathBuf),

    #[error("Image build failed: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Builds model images through a [`ContainerRuntime`].
#[derive(Clone)]
pub struct ImageBuilder {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ImageBuilder {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Build `artifact_path` (a tar build context) into `<image_name>:latest`
    /// and return the full image reference.
    ///
    /// Returns only once the build has finished or failed.
    pub async fn build(&self, artifact_path: &Path, image_name: &str) -> Result<String, BuildError> {
        let metadata = match tokio::fs::metadata(artifact_path).await {
            Ok(m) if m.is_file() => m,
            _ => return Err(BuildError::ContextMissing(artifact_path.to_path_buf())),
        };
        if metadata.len() == 0 {
            return Err(BuildError::EmptyContext(artifact_path.to_path_buf()));
        }

        let reference = image_reference(image_name);
        let start = Instant::now();

        tracing::info!(
            image = %reference,
            context_bytes = metadata.len(),
            "Building image",
        );

        match self.runtime.build_image(artifact_path, &reference).await {
            Ok(()) => {
                tracing::info!(
                    image = %reference,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Image built",
                );
                Ok(reference)
            }
            Err(e) => {
                tracing::warn!(
                    image = %reference,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    error = %e,
                    "Image build failed",
                );
                Err(e.into())
            }
        }
    }
}

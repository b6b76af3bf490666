//! Streaming multipart file fields into the artifact store.

use std::path::PathBuf;

use axum::extract::multipart::Field;
use modelbay_lifecycle::artifacts::LocalArtifactStore;
use modelbay_lifecycle::error::LifecycleError;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};

/// A file field written to the artifact store.
#[derive(Debug)]
pub struct StoredUpload {
    /// Original filename as sent by the client.
    pub filename: String,
    pub path: PathBuf,
    pub bytes: u64,
}

/// Write one file field chunk by chunk into a fresh artifact file.
///
/// A partially written file is removed if the upload fails.
pub async fn store_field(
    store: &LocalArtifactStore,
    mut field: Field<'_>,
    fallback_name: &str,
) -> AppResult<StoredUpload> {
    let filename = field
        .file_name()
        .filter(|n| !n.is_empty())
        .unwrap_or(fallback_name)
        .to_string();

    let (path, mut file) = store
        .create(&filename)
        .await
        .map_err(LifecycleError::from)?;

    let mut bytes = 0u64;
    let copy: AppResult<()> = async {
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::InternalError(format!("Failed to write upload: {e}")))?;
            bytes += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to write upload: {e}")))
    }
    .await;

    if let Err(e) = copy {
        discard(store, &path).await;
        return Err(e);
    }

    tracing::debug!(filename = %filename, bytes, "Upload stored");
    Ok(StoredUpload {
        filename,
        path,
        bytes,
    })
}

/// Remove a stored upload that will not be used, logging any failure.
pub async fn discard(store: &LocalArtifactStore, path: &std::path::Path) {
    if let Err(e) = store.delete(path).await {
        tracing::warn!(error = %e, "Failed to discard upload");
    }
}

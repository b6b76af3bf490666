use std::path::PathBuf;

/// Errors raised by a [`ContainerRuntime`](crate::runtime::ContainerRuntime)
/// implementation.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The runtime binary could not be spawned (missing, not executable).
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The build context could not be opened for streaming.
    #[error("Failed to read build context {path}: {source}")]
    Context {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The operation did not finish within its time budget and was killed.
    #[error("{operation} timed out after {elapsed_ms}ms")]
    Timeout { operation: String, elapsed_ms: u64 },

    /// The runtime ran the operation and reported a failure.
    #[error("{operation} failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        operation: String,
        exit_code: i32,
        stderr: String,
    },

    /// The referenced container or image does not exist.
    #[error("No such resource: {0}")]
    NotFound(String),

    /// A container or image name failed the safety check.
    #[error("Invalid resource name: {0:?}")]
    InvalidName(String),

    /// The runtime could not be reached at all.
    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

//! Subprocess execution with captured output and a hard timeout.
//!
//! [`run_command`] spawns a prepared [`Command`], optionally streams a file
//! into its stdin (used for `docker build -`), captures stdout/stderr, and
//! kills the child if it outlives the timeout.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::RuntimeError;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Captured output of a finished process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by a signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `cmd` to completion.
///
/// A non-zero exit is returned as `Ok` so the caller can interpret stderr.
/// `operation` names the call in errors and logs. When `stdin_file` is set the
/// file is opened before spawning and copied into the child's stdin
/// concurrently with output capture.
pub async fn run_command(
    cmd: &mut Command,
    operation: &str,
    stdin_file: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, RuntimeError> {
    let input = match stdin_file {
        Some(path) => Some(tokio::fs::File::open(path).await.map_err(|source| {
            RuntimeError::Context {
                path: path.to_path_buf(),
                source,
            }
        })?),
        None => None,
    };

    // `kill_on_drop(true)` ensures the child is killed when dropped (e.g. on timeout).
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|source| RuntimeError::Spawn {
        program: cmd.as_std().get_program().to_string_lossy().into_owned(),
        source,
    })?;

    let stdin_task = match (input, child.stdin.take()) {
        (Some(mut file), Some(mut stdin)) => Some(tokio::spawn(async move {
            // The child may exit before consuming everything; that surfaces
            // through its exit code, not here.
            let _ = tokio::io::copy(&mut file, &mut stdin).await;
        })),
        _ => None,
    };

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    let wait_result = tokio::time::timeout(timeout, child.wait()).await;

    match wait_result {
        Ok(Ok(status)) => {
            if let Some(task) = stdin_task {
                let _ = task.await;
            }
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code: status.code().unwrap_or(-1),
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
        Ok(Err(source)) => Err(RuntimeError::Spawn {
            program: operation.to_string(),
            source,
        }),
        Err(_) => {
            if let Some(task) = stdin_task {
                task.abort();
            }
            Err(RuntimeError::Timeout {
                operation: operation.to_string(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
    }
}

/// Drain an output stream to EOF, keeping at most [`MAX_OUTPUT_BYTES`].
///
/// Bytes past the cap are read and dropped so the child never blocks on a
/// full pipe.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    let Some(mut h) = handle else {
        return buf;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match h.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let keep = n.min(MAX_OUTPUT_BYTES - buf.len());
                buf.extend_from_slice(&chunk[..keep]);
            }
        }
    }
    buf
}

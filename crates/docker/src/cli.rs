//! [`ContainerRuntime`] backed by the `docker` command-line client.
//!
//! Every call spawns one `docker` subprocess through
//! [`run_command`](crate::subprocess::run_command). Builds get their own,
//! longer timeout; all other operations share the command timeout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::RuntimeError;
use crate::names::{is_safe_container_name, is_safe_image_reference};
use crate::runtime::{ContainerFilter, ContainerRuntime, ContainerSpec, ContainerSummary};
use crate::subprocess::run_command;

/// Default timeout for `docker build`.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(600);

/// Default timeout for every other docker invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Output format for `docker ps`: id, names, state separated by tabs.
const PS_FORMAT: &str = "{{.ID}}\t{{.Names}}\t{{.State}}";

/// Drives a local container engine through its CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
    build_timeout: Duration,
    command_timeout: Duration,
}

impl DockerCli {
    /// * `binary` - path or name of the docker executable.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, build: Duration, command: Duration) -> Self {
        self.build_timeout = build;
        self.command_timeout = command;
        self
    }

    /// Run `docker <args>` and return trimmed stdout, mapping a non-zero
    /// exit to a [`RuntimeError`].
    async fn docker(
        &self,
        args: &[&str],
        stdin_file: Option<&Path>,
        timeout: Duration,
    ) -> Result<String, RuntimeError> {
        let operation = format!("docker {}", args.first().copied().unwrap_or_default());

        tracing::debug!(operation = %operation, ?args, "Invoking container runtime");

        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        let output = run_command(&mut cmd, &operation, stdin_file, timeout).await?;

        if output.success() {
            tracing::debug!(
                operation = %operation,
                duration_ms = output.duration_ms,
                "Container runtime call succeeded",
            );
            return Ok(output.stdout.trim().to_string());
        }

        Err(classify_failure(
            operation,
            output.exit_code,
            output.stderr.trim().to_string(),
        ))
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn build_image(&self, context: &Path, tag: &str) -> Result<(), RuntimeError> {
        ensure_image_reference(tag)?;
        self.docker(
            &["build", "--quiet", "--tag", tag, "-"],
            Some(context),
            self.build_timeout,
        )
        .await
        .map(|_| ())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        ensure_container_name(&spec.name)?;
        ensure_image_reference(&spec.image)?;
        let expose = format!("{}/tcp", spec.port);
        let publish = format!("{0}:{0}/tcp", spec.port);
        self.docker(
            &[
                "create",
                "--name",
                spec.name.as_str(),
                "--expose",
                expose.as_str(),
                "--publish",
                publish.as_str(),
                spec.image.as_str(),
            ],
            None,
            self.command_timeout,
        )
        .await
    }

    async fn start_container(&self, id: &str) -> Result<(), RuntimeError> {
        ensure_container_name(id)?;
        self.docker(&["start", id], None, self.command_timeout)
            .await
            .map(|_| ())
    }

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError> {
        ensure_container_name(id)?;
        self.docker(&["stop", id], None, self.command_timeout)
            .await
            .map(|_| ())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        ensure_container_name(id)?;
        let args: &[&str] = if force {
            &["rm", "--force", id]
        } else {
            &["rm", id]
        };
        self.docker(args, None, self.command_timeout).await.map(|_| ())
    }

    async fn remove_image(&self, reference: &str, force: bool) -> Result<(), RuntimeError> {
        ensure_image_reference(reference)?;
        let args: &[&str] = if force {
            &["rmi", "--force", reference]
        } else {
            &["rmi", reference]
        };
        self.docker(args, None, self.command_timeout).await.map(|_| ())
    }

    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let name_filter = match &filter.name {
            Some(name) => {
                ensure_container_name(name)?;
                Some(format!("name=^/{name}$"))
            }
            None => None,
        };

        let mut args = vec!["ps", "--no-trunc", "--format", PS_FORMAT];
        if filter.all {
            args.push("--all");
        }
        if let Some(name_filter) = &name_filter {
            args.push("--filter");
            args.push(name_filter);
        }

        let stdout = self.docker(&args, None, self.command_timeout).await?;
        Ok(stdout.lines().filter_map(parse_ps_line).collect())
    }
}

/// Parse one line of `docker ps` output in [`PS_FORMAT`].
pub fn parse_ps_line(line: &str) -> Option<ContainerSummary> {
    let mut parts = line.trim().split('\t');
    let id = parts.next().filter(|s| !s.is_empty())?;
    let names = parts.next()?;
    let state = parts.next().unwrap_or_default();
    Some(ContainerSummary {
        id: id.to_string(),
        names: names.split(',').map(|n| n.trim().to_string()).collect(),
        state: state.trim().to_lowercase(),
    })
}

/// Map docker's stderr to a specific error where the message is well known.
fn classify_failure(operation: String, exit_code: i32, stderr: String) -> RuntimeError {
    if stderr.contains("No such container")
        || stderr.contains("No such image")
        || stderr.contains("No such object")
    {
        RuntimeError::NotFound(stderr)
    } else if stderr.contains("Cannot connect to the Docker daemon") {
        RuntimeError::Unavailable(stderr)
    } else {
        RuntimeError::CommandFailed {
            operation,
            exit_code,
            stderr,
        }
    }
}

fn ensure_container_name(name: &str) -> Result<(), RuntimeError> {
    if is_safe_container_name(name) {
        Ok(())
    } else {
        Err(RuntimeError::InvalidName(name.to_string()))
    }
}

fn ensure_image_reference(reference: &str) -> Result<(), RuntimeError> {
    if is_safe_image_reference(reference) {
        Ok(())
    } else {
        Err(RuntimeError::InvalidName(reference.to_string()))
    }
}

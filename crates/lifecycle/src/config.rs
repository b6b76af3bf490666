use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use modelbay_docker::cli::DockerCli;
use modelbay_docker::memory::InMemoryRuntime;
use modelbay_docker::runtime::ContainerRuntime;

/// Which [`ContainerRuntime`] implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    /// The local `docker` CLI.
    Docker,
    /// In-process runtime; nothing is actually built or run.
    Memory,
}

impl std::str::FromStr for RuntimeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown container runtime \"{other}\"")),
        }
    }
}

/// Lifecycle configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Directory holding uploaded artifacts and test images.
    pub upload_dir: PathBuf,
    pub runtime: RuntimeKind,
    /// Path or name of the docker executable.
    pub docker_bin: PathBuf,
    pub build_timeout: Duration,
    /// Timeout for every container operation other than build.
    pub container_timeout: Duration,
    /// Timeout for one inference request.
    pub inference_timeout: Duration,
    /// Host on which published model ports are reachable.
    pub inference_host: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("./uploads"),
            runtime: RuntimeKind::Docker,
            docker_bin: PathBuf::from("docker"),
            build_timeout: Duration::from_secs(600),
            container_timeout: Duration::from_secs(60),
            inference_timeout: Duration::from_secs(30),
            inference_host: "localhost".to_string(),
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default     |
    /// |--------------------------|-------------|
    /// | `UPLOAD_DIR`             | `./uploads` |
    /// | `CONTAINER_RUNTIME`      | `docker`    |
    /// | `DOCKER_BIN`             | `docker`    |
    /// | `BUILD_TIMEOUT_SECS`     | `600`       |
    /// | `CONTAINER_TIMEOUT_SECS` | `60`        |
    /// | `INFERENCE_TIMEOUT_SECS` | `30`        |
    /// | `INFERENCE_HOST`         | `localhost` |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let upload_dir = std::env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_dir);

        let runtime: RuntimeKind = std::env::var("CONTAINER_RUNTIME")
            .unwrap_or_else(|_| "docker".into())
            .parse()
            .expect("CONTAINER_RUNTIME must be \"docker\" or \"memory\"");

        let docker_bin = std::env::var("DOCKER_BIN")
            .map(PathBuf::from)
            .unwrap_or(defaults.docker_bin);

        let inference_host =
            std::env::var("INFERENCE_HOST").unwrap_or(defaults.inference_host);

        Self {
            upload_dir,
            runtime,
            docker_bin,
            build_timeout: secs_from_env("BUILD_TIMEOUT_SECS", defaults.build_timeout),
            container_timeout: secs_from_env("CONTAINER_TIMEOUT_SECS", defaults.container_timeout),
            inference_timeout: secs_from_env("INFERENCE_TIMEOUT_SECS", defaults.inference_timeout),
            inference_host,
        }
    }

    /// Construct the configured container runtime.
    pub fn container_runtime(&self) -> Arc<dyn ContainerRuntime> {
        match self.runtime {
            RuntimeKind::Docker => Arc::new(
                DockerCli::new(&self.docker_bin)
                    .with_timeouts(self.build_timeout, self.container_timeout),
            ),
            RuntimeKind::Memory => Arc::new(InMemoryRuntime::new()),
        }
    }
}

fn secs_from_env(var: &str, default: Duration) -> Duration {
    match std::env::var(var) {
        Ok(value) => Duration::from_secs(
            value
                .parse()
                .unwrap_or_else(|_| panic!("{var} must be a valid u64")),
        ),
        Err(_) => default,
    }
}

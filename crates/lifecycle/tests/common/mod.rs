//! Shared harness for lifecycle integration tests.
//!
//! Builds a [`ModelService`] over an [`InMemoryRuntime`] and a temporary
//! upload directory, and can spawn a throwaway inference service.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use modelbay_core::model::{DeployRequest, Model};
use modelbay_docker::memory::InMemoryRuntime;
use modelbay_lifecycle::artifacts::LocalArtifactStore;
use modelbay_lifecycle::inference::{InferenceDispatcher, TestInput};
use modelbay_lifecycle::service::ModelService;
use tempfile::TempDir;

pub struct Harness {
    pub service: Arc<ModelService>,
    pub runtime: Arc<InMemoryRuntime>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_runtime(InMemoryRuntime::new())
    }

    pub fn with_runtime(runtime: InMemoryRuntime) -> Self {
        Self::build(runtime, Duration::from_secs(5))
    }

    /// Harness whose dispatcher gives up on a request after `timeout`.
    pub fn with_inference_timeout(timeout: Duration) -> Self {
        Self::build(InMemoryRuntime::new(), timeout)
    }

    fn build(runtime: InMemoryRuntime, inference_timeout: Duration) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let runtime = Arc::new(runtime);
        let service = ModelService::new(
            runtime.clone(),
            LocalArtifactStore::new(dir.path().join("uploads")),
            InferenceDispatcher::new("127.0.0.1", inference_timeout),
        );
        Self {
            service: Arc::new(service),
            runtime,
            dir,
        }
    }

    /// Store a fake build context and return a deploy request for it.
    pub async fn request(&self, name: &str, port: u16) -> DeployRequest {
        let path = self
            .service
            .artifacts()
            .save("model.tar", b"fake-build-context")
            .await
            .expect("save artifact");
        DeployRequest::new(name, path).with_port(port)
    }

    pub async fn deploy(&self, name: &str, port: u16) -> Model {
        let request = self.request(name, port).await;
        self.service.deploy(request).await.expect("deploy should succeed")
    }

    pub async fn deploy_running(&self, name: &str, port: u16) -> Model {
        let model = self.deploy(name, port).await;
        self.start(model).await
    }

    /// Deploy and start a model served on `endpoint` instead of `/predict`.
    pub async fn deploy_running_at(&self, name: &str, port: u16, endpoint: &str) -> Model {
        let request = self.request(name, port).await.with_endpoint(endpoint);
        let model = self.service.deploy(request).await.expect("deploy should succeed");
        self.start(model).await
    }

    async fn start(&self, model: Model) -> Model {
        self.service
            .toggle(model.id)
            .await
            .expect("start should succeed")
    }

    pub async fn input(&self, filename: &str) -> TestInput {
        let path = self
            .service
            .artifacts()
            .save(filename, b"\xff\xd8\xff\xe0 fake jpeg")
            .await
            .expect("save input");
        TestInput::new(filename, path)
    }
}

/// Stand-in inference service: answers `cat.jpg` with a cat prediction and
/// every other file with HTTP 503.
async fn predict(mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("image") {
            continue;
        }
        return match field.file_name() {
            Some("cat.jpg") => Json(serde_json::json!({
                "prediction": "cat",
                "confidence": 91.2,
            }))
            .into_response(),
            _ => (StatusCode::SERVICE_UNAVAILABLE, "model overloaded").into_response(),
        };
    }
    (StatusCode::BAD_REQUEST, "missing image field").into_response()
}

/// Answers 200 with a body that is not JSON.
async fn predict_plain_text(_body: Bytes) -> &'static str {
    "not json"
}

/// Never answers within any test's dispatcher timeout.
async fn predict_slowly(_body: Bytes) -> &'static str {
    tokio::time::sleep(Duration::from_secs(60)).await;
    "{}"
}

/// Bind the stand-in service to an ephemeral port and return the port.
///
/// Routes: `/predict` (see [`predict`]), `/plain` (200 with a non-JSON
/// body) and `/slow` (sleeps for a minute).
pub async fn spawn_inference_stub() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let port = listener.local_addr().expect("local addr").port();
    let app = Router::new()
        .route("/predict", post(predict))
        .route("/plain", post(predict_plain_text))
        .route("/slow", post(predict_slowly));
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    port
}

/// A port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    listener.local_addr().expect("local addr").port()
}

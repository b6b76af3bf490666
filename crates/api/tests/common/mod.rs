//! Shared helpers for API integration tests.
//!
//! The app runs over an [`InMemoryRuntime`] and a temporary upload
//! directory, with the same middleware stack as production.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use modelbay_api::config::ServerConfig;
use modelbay_api::router::build_app_router;
use modelbay_api::state::AppState;
use modelbay_docker::memory::InMemoryRuntime;
use modelbay_lifecycle::artifacts::LocalArtifactStore;
use modelbay_lifecycle::inference::InferenceDispatcher;
use modelbay_lifecycle::service::ModelService;
use tempfile::TempDir;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 16 * 1024 * 1024,
    }
}

pub struct TestApp {
    pub router: Router,
    pub runtime: Arc<InMemoryRuntime>,
    pub service: Arc<ModelService>,
    pub dir: TempDir,
}

/// Build the full application router over a fresh in-memory runtime.
pub fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let runtime = Arc::new(InMemoryRuntime::new());
    let service = Arc::new(ModelService::new(
        runtime.clone(),
        LocalArtifactStore::new(dir.path().join("uploads")),
        InferenceDispatcher::new("127.0.0.1", Duration::from_secs(5)),
    ));
    let config = test_config();
    let state = AppState {
        service: service.clone(),
        config: Arc::new(config.clone()),
    };
    TestApp {
        router: build_app_router(state, &config),
        runtime,
        service,
        dir,
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_empty(app: &Router, uri: &str) -> Response<Body> {
    send(
        app,
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    send(
        app,
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Hand-built `multipart/form-data` body.
pub struct Form {
    boundary: &'static str,
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self {
            boundary: "modelbay-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn post(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// A deploy form for `name` on `port` with a small fake build context.
pub fn deploy_form(name: &str, port: u16) -> Form {
    Form::new()
        .text("modelName", name)
        .text("description", "test model")
        .text("port", &port.to_string())
        .file("dockerContainer", "model.tar", b"fake-build-context")
}

/// Deploy through the API and return the model JSON.
pub async fn deploy(app: &Router, name: &str, port: u16) -> serde_json::Value {
    let response = send(app, deploy_form(name, port).post("/api/models/deploy")).await;
    assert_eq!(response.status(), 201);
    body_json(response).await["data"].clone()
}

/// Count files currently in the upload directory.
pub fn upload_count(app: &TestApp) -> usize {
    std::fs::read_dir(app.dir.path().join("uploads"))
        .map(|d| d.count())
        .unwrap_or(0)
}

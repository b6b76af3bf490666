//! Sends test inputs to a running model's HTTP endpoint.
//!
//! Every attempt becomes a [`TestResult`]; failures never escape as errors.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use modelbay_core::model::Model;
use modelbay_core::test_result::TestResult;
use serde::Deserialize;

/// Prediction label recorded when the service omits one.
pub const UNKNOWN_PREDICTION: &str = "Unknown";

/// Multipart field carrying the input file.
const IMAGE_FIELD: &str = "image";

/// One file to send to a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestInput {
    /// Name reported to the model and recorded in the result.
    pub filename: String,
    pub path: PathBuf,
}

impl TestInput {
    pub fn new(filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Failed to read input {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Inference request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("Inference request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Inference service returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Malformed inference response: {0}")]
    MalformedBody(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e)
        } else {
            Self::Request(e)
        }
    }
}

/// Response body of a backing inference service.
#[derive(Debug, Default, Deserialize)]
struct PredictionBody {
    #[serde(default)]
    prediction: Option<serde_json::Value>,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
}

impl PredictionBody {
    fn label(&self) -> String {
        match &self.prediction {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(serde_json::Value::Null) | None => UNKNOWN_PREDICTION.to_string(),
            Some(serde_json::Value::String(_)) => UNKNOWN_PREDICTION.to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// Numeric or numeric-string confidence; anything else is `0`.
    fn score(&self) -> f64 {
        match &self.confidence {
            Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

pub struct InferenceDispatcher {
    client: reqwest::Client,
    host: String,
}

impl InferenceDispatcher {
    /// * `host` - host on which model ports are published.
    /// * `timeout` - limit for one request, connect included.
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self::with_client(client, host)
    }

    pub fn with_client(client: reqwest::Client, host: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
        }
    }

    /// URL of the model's inference route.
    pub fn endpoint_url(&self, model: &Model) -> String {
        format!("http://{}:{}{}", self.host, model.port, model.endpoint)
    }

    /// Send one input. The caller is responsible for checking the model is
    /// running.
    pub async fn dispatch(&self, model: &Model, input: &TestInput) -> TestResult {
        let start = Instant::now();
        let outcome = self.call(model, input).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(body) => {
                tracing::debug!(
                    model_id = %model.id,
                    filename = %input.filename,
                    elapsed_ms,
                    "Inference completed",
                );
                TestResult::completed(
                    &input.filename,
                    &model.name,
                    body.label(),
                    body.score(),
                    elapsed_ms,
                )
            }
            Err(e) => {
                tracing::warn!(
                    model_id = %model.id,
                    filename = %input.filename,
                    elapsed_ms,
                    error = %e,
                    "Inference failed",
                );
                TestResult::failed(&input.filename, &model.name, e.to_string(), elapsed_ms)
            }
        }
    }

    /// Send inputs one after another. Always yields one result per input, in
    /// input order.
    pub async fn dispatch_batch(&self, model: &Model, inputs: &[TestInput]) -> Vec<TestResult> {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            results.push(self.dispatch(model, input).await);
        }
        results
    }

    async fn call(&self, model: &Model, input: &TestInput) -> Result<PredictionBody, DispatchError> {
        let bytes = tokio::fs::read(&input.path)
            .await
            .map_err(|source| DispatchError::ReadInput {
                path: input.path.clone(),
                source,
            })?;

        let part = reqwest::multipart::Part::bytes(bytes).file_name(input.filename.clone());
        let form = reqwest::multipart::Form::new().part(IMAGE_FIELD, part);

        let response = self
            .client
            .post(self.endpoint_url(model))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(DispatchError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| DispatchError::MalformedBody(e.to_string()))
    }
}

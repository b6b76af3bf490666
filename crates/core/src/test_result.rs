//! Outcome records for test inference requests.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Prediction label recorded for every failed attempt.
pub const ERROR_PREDICTION: &str = "Error";

/// Upper bound of the confidence scale.
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Outcome of one inference attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Completed,
    Failed,
    /// Shown by UI clients for in-flight uploads. Never produced here.
    Processing,
}

/// One inference attempt against a model.
///
/// Results reference their model by *name*, not id, so historical results
/// survive (as orphans) when the model is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: uuid::Uuid,
    pub filename: String,
    pub model_name: String,
    /// Score in `0.0..=100.0` on success, `0.0` on failure.
    pub confidence: f64,
    pub prediction: String,
    pub inference_time_ms: u64,
    pub status: TestStatus,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestResult {
    /// A successful attempt. `confidence` is clamped to the valid scale and
    /// non-finite values are recorded as zero.
    pub fn completed(
        filename: impl Into<String>,
        model_name: impl Into<String>,
        prediction: impl Into<String>,
        confidence: f64,
        inference_time_ms: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            filename: filename.into(),
            model_name: model_name.into(),
            confidence: clamp_confidence(confidence),
            prediction: prediction.into(),
            inference_time_ms,
            status: TestStatus::Completed,
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// A failed attempt carrying the failure message.
    pub fn failed(
        filename: impl Into<String>,
        model_name: impl Into<String>,
        error: impl Into<String>,
        inference_time_ms: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            filename: filename.into(),
            model_name: model_name.into(),
            confidence: 0.0,
            prediction: ERROR_PREDICTION.to_string(),
            inference_time_ms,
            status: TestStatus::Failed,
            timestamp: Utc::now(),
            error: Some(error.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TestStatus::Completed
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, MAX_CONFIDENCE)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_keeps_prediction_and_confidence() {
        let r = TestResult::completed("cat.jpg", "detector", "cat", 91.2, 14);
        assert_eq!(r.status, TestStatus::Completed);
        assert_eq!(r.prediction, "cat");
        assert_eq!(r.confidence, 91.2);
        assert_eq!(r.inference_time_ms, 14);
        assert!(r.error.is_none());
    }

    #[test]
    fn failed_uses_error_label_and_zero_confidence() {
        let r = TestResult::failed("dog.jpg", "detector", "connection refused", 3);
        assert_eq!(r.status, TestStatus::Failed);
        assert_eq!(r.prediction, ERROR_PREDICTION);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(TestResult::completed("a", "m", "x", 140.0, 0).confidence, 100.0);
        assert_eq!(TestResult::completed("a", "m", "x", -3.0, 0).confidence, 0.0);
        assert_eq!(TestResult::completed("a", "m", "x", f64::NAN, 0).confidence, 0.0);
    }

    #[test]
    fn error_field_omitted_on_success() {
        let r = TestResult::completed("a.png", "m", "cat", 50.0, 1);
        let json = serde_json::to_value(&r).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["status"], "completed");
        assert_eq!(json["model_name"], "m");
    }

    #[test]
    fn ids_are_unique() {
        let a = TestResult::failed("a", "m", "e", 0);
        let b = TestResult::failed("a", "m", "e", 0);
        assert_ne!(a.id, b.id);
    }
}

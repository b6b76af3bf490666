//! Analytics reduction over models and test results.
//!
//! Pure logic: the caller snapshots the registry and result log and passes
//! them in. Per-model figures join results to models by name.

use serde::Serialize;

use crate::model::{Model, ModelStatus};
use crate::test_result::TestResult;

/// Platform-wide summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub total_models: usize,
    pub active_models: usize,
    pub total_tests: usize,
    /// Mean confidence over all results, one decimal.
    pub avg_accuracy: f64,
    /// Mean inference time over all results, whole milliseconds.
    pub avg_inference_ms: u64,
    /// Percentage of completed results, one decimal.
    pub success_rate: f64,
    pub models: Vec<ModelAnalytics>,
}

/// Per-model summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelAnalytics {
    pub name: String,
    pub status: ModelStatus,
    pub tests: usize,
    /// Mean confidence over this model's results, one decimal.
    pub avg_accuracy: f64,
}

/// Reduce the current models and results into an [`Analytics`] summary.
pub fn summarize(models: &[Model], results: &[TestResult]) -> Analytics {
    let total_tests = results.len();
    let completed = results.iter().filter(|r| r.is_completed()).count();
    let total_ms: u64 = results.iter().map(|r| r.inference_time_ms).sum();

    Analytics {
        total_models: models.len(),
        active_models: models.iter().filter(|m| m.is_running()).count(),
        total_tests,
        avg_accuracy: round1(mean_confidence(results.iter())),
        avg_inference_ms: if total_tests == 0 {
            0
        } else {
            (total_ms as f64 / total_tests as f64).round() as u64
        },
        success_rate: if total_tests == 0 {
            0.0
        } else {
            round1(completed as f64 / total_tests as f64 * 100.0)
        },
        models: models
            .iter()
            .map(|m| {
                let own: Vec<&TestResult> =
                    results.iter().filter(|r| r.model_name == m.name).collect();
                ModelAnalytics {
                    name: m.name.clone(),
                    status: m.status,
                    tests: own.len(),
                    avg_accuracy: round1(mean_confidence(own.into_iter())),
                }
            })
            .collect(),
    }
}

fn mean_confidence<'a>(results: impl Iterator<Item = &'a TestResult>) -> f64 {
    let (sum, count) = results.fold((0.0, 0usize), |(s, n), r| (s + r.confidence, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

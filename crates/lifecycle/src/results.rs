//! Append-only log of test results.

use modelbay_core::test_result::TestResult;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct ResultLog {
    results: RwLock<Vec<TestResult>>,
}

impl ResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch, keeping its order. Batches are appended atomically.
    pub async fn append_all(&self, batch: impl IntoIterator<Item = TestResult>) {
        self.results.write().await.extend(batch);
    }

    /// All results, oldest first.
    pub async fn list(&self) -> Vec<TestResult> {
        self.results.read().await.clone()
    }
}

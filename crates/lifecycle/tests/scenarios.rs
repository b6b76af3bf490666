//! End-to-end lifecycle scenarios: deploy and test, delete with failing
//! teardown, concurrent toggles.

mod common;

use std::time::Duration;

use common::{spawn_inference_stub, Harness};
use modelbay_core::model::ModelStatus;
use modelbay_core::test_result::{TestStatus, ERROR_PREDICTION};
use modelbay_docker::controller::CleanupStep;
use modelbay_docker::memory::{InMemoryRuntime, Operation};
use modelbay_lifecycle::events::LifecycleEventKind;

// ---------------------------------------------------------------------------
// Deploy, start and test a model; one input succeeds, one fails
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deploy_start_and_test_mixed_batch() {
    let h = Harness::new();
    let port = spawn_inference_stub().await;

    let model = h.deploy("detector", port).await;
    assert_eq!(model.status, ModelStatus::Stopped);
    assert_eq!(model.endpoint, "/predict");

    let model = h.service.toggle(model.id).await.expect("toggle should start");
    assert_eq!(model.status, ModelStatus::Running);
    assert!(h.runtime.is_running(&model.container_name));

    let inputs = vec![h.input("cat.jpg").await, h.input("dog.jpg").await];
    let results = h.service.run_test(model.id, inputs).await.expect("run test");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status, TestStatus::Completed);
    assert_eq!(results[0].prediction, "cat");
    assert_eq!(results[0].confidence, 91.2);
    assert_eq!(results[0].model_name, "detector");
    assert_eq!(results[1].status, TestStatus::Failed);
    assert_eq!(results[1].prediction, ERROR_PREDICTION);
    assert_eq!(results[1].confidence, 0.0);
    assert!(results[1].error.as_deref().unwrap().contains("503"));

    assert_eq!(h.service.get_model(model.id).await.unwrap().image_count, 2);
    assert_eq!(h.service.list_results().await, results);
}

// ---------------------------------------------------------------------------
// Delete a running model whose stop fails
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_survives_failing_stop() {
    let h = Harness::new();
    let model = h.deploy_running("detector", 8080).await;
    let mut events = h.service.subscribe();

    h.runtime.fail(Operation::Stop, "daemon not responding");
    let report = h.service.delete(model.id).await.expect("delete never fails");

    assert_eq!(report.cleanup_errors.len(), 1);
    assert_eq!(report.cleanup_errors[0].step, CleanupStep::StopContainer);
    assert!(h.service.list_models().await.is_empty());
    assert!(h.service.get_model(model.id).await.unwrap_err().is_not_found());

    // Force removal still cleared the container, image and artifact.
    assert!(h.runtime.container_names().is_empty());
    assert!(!h.runtime.has_image(&model.image_reference));
    assert!(!model.artifact_path.exists());

    let first = events.recv().await.unwrap();
    assert!(matches!(first.kind, LifecycleEventKind::CleanupFailed { .. }));
    let second = events.recv().await.unwrap();
    assert_eq!(second.kind, LifecycleEventKind::Deleted);
}

// ---------------------------------------------------------------------------
// Two concurrent toggles on a stopped model
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_toggles_start_once() {
    let h = Harness::with_runtime(InMemoryRuntime::new().with_latency(Duration::from_millis(30)));
    let model = h.deploy("detector", 8080).await;

    let (a, b) = tokio::join!(
        {
            let service = h.service.clone();
            async move { service.toggle(model.id).await }
        },
        {
            let service = h.service.clone();
            async move { service.toggle(model.id).await }
        },
    );

    assert_eq!(a.unwrap().status, ModelStatus::Running);
    assert_eq!(b.unwrap().status, ModelStatus::Running);
    assert_eq!(h.runtime.calls(Operation::Start), 1);
    assert_eq!(
        h.service.get_model(model.id).await.unwrap().status,
        ModelStatus::Running
    );
}

#[tokio::test]
async fn concurrent_toggles_on_different_models_run_in_parallel() {
    let h = Harness::with_runtime(InMemoryRuntime::new().with_latency(Duration::from_millis(20)));
    let a = h.deploy("a", 8081).await;
    let b = h.deploy("b", 8082).await;

    let (ra, rb) = tokio::join!(h.service.toggle(a.id), h.service.toggle(b.id));

    assert_eq!(ra.unwrap().status, ModelStatus::Running);
    assert_eq!(rb.unwrap().status, ModelStatus::Running);
    assert_eq!(h.runtime.calls(Operation::Start), 2);
}

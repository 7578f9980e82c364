//! Test: Cancellation - no leaked environments, every pipeline still reported

use crate::helpers::*;
use pipeline_matrix::core::Verdict;
use pipeline_matrix::execution::{MatrixRunner, RunnerConfig};
use std::time::Duration;

#[tokio::test]
async fn test_cancel_releases_in_flight_and_reports_pending() {
    let yaml = simple_yaml(&[
        ("running", &["echo started", "sleep 60000", "echo never"]),
        ("queued1", &["echo 1"]),
        ("queued2", &["echo 2"]),
    ]);
    let provisioner = MockProvisioner::new();
    let state = provisioner.state.clone();
    let runner = MatrixRunner::new(provisioner, RunnerConfig::new().with_concurrency(1));

    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(10), runner.execute(&matrix(&yaml)))
        .await
        .expect("cancelled run should return promptly");

    assert!(result.cancelled);
    assert_eq!(result.pipelines.len(), 3);

    let running = pipeline(&result, "running");
    assert_eq!(running.verdict, Verdict::Errored);
    assert_eq!(running.error.as_deref(), Some("cancelled"));
    assert_eq!(executed(&result, "running"), vec!["echo started"]);

    for name in ["queued1", "queued2"] {
        let queued = pipeline(&result, name);
        assert_eq!(queued.verdict, Verdict::Errored);
        assert_eq!(queued.error.as_deref(), Some("cancelled before start"));
        assert!(queued.commands.is_empty());
    }

    assert_eq!(result.verdict, Verdict::Failed);
    assert_eq!(state.acquires(), 1);
    state.assert_no_leaks();
}

#[tokio::test]
async fn test_cancel_during_provisioning_does_not_leak() {
    let yaml = simple_yaml(&[("a", &["sleep 60000"]), ("b", &["sleep 60000"])]);
    let provisioner = MockProvisioner::new().with_acquire_delay(Duration::from_millis(30));
    let state = provisioner.state.clone();
    let runner = MatrixRunner::new(provisioner, RunnerConfig::new().with_concurrency(0));

    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
    });

    let result = runner.execute(&matrix(&yaml)).await;

    assert!(result.cancelled);
    assert_verdict(&result, "a", Verdict::Errored);
    assert_verdict(&result, "b", Verdict::Errored);
    assert!(state.executed_commands().is_empty());
    state.assert_no_leaks();
}

#[tokio::test]
async fn test_uncancelled_run_is_not_marked_cancelled() {
    let yaml = simple_yaml(&[("a", &["echo 1"])]);
    let (result, _) = run_yaml(&yaml, RunnerConfig::new()).await;
    assert!(!result.cancelled);
    assert_eq!(result.verdict, Verdict::Success);
}

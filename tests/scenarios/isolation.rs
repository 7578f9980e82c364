//! Test: Isolation - one pipeline's outcome never affects another's

use crate::helpers::*;
use pipeline_matrix::core::Verdict;
use pipeline_matrix::execution::RunnerConfig;
use pipeline_matrix::report::summarize;
use std::time::Duration;

#[tokio::test]
async fn test_one_failure_among_five_successes() {
    let yaml = simple_yaml(&[
        ("p1", &["echo 1"]),
        ("p2", &["echo 2"]),
        ("p3", &["exit 1"]),
        ("p4", &["echo 4"]),
        ("p5", &["echo 5"]),
        ("p6", &["echo 6"]),
    ]);
    let (result, _) = run_yaml(&yaml, RunnerConfig::new()).await;

    assert_eq!(result.pipelines.len(), 6);
    assert_eq!(result.count(Verdict::Success), 5);
    assert_verdict(&result, "p3", Verdict::Failed);
    assert_eq!(result.verdict, Verdict::Failed);

    let (verdict, report) = summarize(&result);
    assert_eq!(verdict, Verdict::Failed);
    assert!(report.contains("Result: FAILED (5 passed, 1 failed, 0 errored)"));
}

#[tokio::test]
async fn test_provision_failure_is_scoped_to_its_pipeline() {
    let yaml = r#"
pipelines:
  custom:
    broken:
      - step:
          image: missing/python:9.9
          script:
            - echo never
    healthy:
      - step:
          image: python:3.7
          script:
            - echo ok
"#;
    let (result, state) = run_yaml(yaml, RunnerConfig::new()).await;

    let broken = pipeline(&result, "broken");
    assert_eq!(broken.verdict, Verdict::Errored);
    assert!(broken.commands.is_empty());
    assert!(broken.error.as_deref().unwrap_or_default().contains("manifest unknown"));

    assert_verdict(&result, "healthy", Verdict::Success);
    assert_eq!(state.acquires(), 1);
    state.assert_no_leaks();
}

#[tokio::test]
async fn test_lost_environment_is_errored_not_failed() {
    let yaml = simple_yaml(&[("flaky", &["echo 1", "lose-environment", "echo 2"]), ("fine", &["echo ok"])]);
    let (result, state) = run_yaml(&yaml, RunnerConfig::new()).await;

    let flaky = pipeline(&result, "flaky");
    assert_eq!(flaky.verdict, Verdict::Errored);
    assert_eq!(executed(&result, "flaky"), vec!["echo 1"]);
    assert!(flaky.error.as_deref().unwrap_or_default().contains("connection reset"));

    assert_verdict(&result, "fine", Verdict::Success);
    state.assert_no_leaks();
}

#[tokio::test]
async fn test_panicking_pipeline_is_errored_and_released() {
    let yaml = simple_yaml(&[("before", &["echo 1"]), ("crash", &["echo 1", "panic"]), ("after", &["echo 3"])]);
    let (result, state) = run_yaml(&yaml, RunnerConfig::new()).await;

    let crash = pipeline(&result, "crash");
    assert_eq!(crash.verdict, Verdict::Errored);
    assert!(crash.error.as_deref().unwrap_or_default().contains("panicked"));

    assert_verdict(&result, "before", Verdict::Success);
    assert_verdict(&result, "after", Verdict::Success);
    state.assert_no_leaks();
}

#[tokio::test]
async fn test_panicked_pipeline_duration_counts_from_spawn() {
    // "crash" is collected only after "slow" finishes
    let yaml = simple_yaml(&[("slow", &["sleep 400"]), ("crash", &["sleep 150", "panic"])]);
    let (result, state) = run_yaml(&yaml, RunnerConfig::new()).await;

    let crash = pipeline(&result, "crash");
    assert_eq!(crash.verdict, Verdict::Errored);
    assert!(
        crash.duration >= Duration::from_millis(150),
        "panicked pipeline reported {:?}",
        crash.duration
    );
    state.assert_no_leaks();
}

#[tokio::test]
async fn test_environments_are_not_shared() {
    let yaml = simple_yaml(&[("a", &["echo a"]), ("b", &["echo b"])]);
    let provisioner = MockProvisioner::new();
    let state = provisioner.state.clone();
    let runner = pipeline_matrix::MatrixRunner::new(provisioner, RunnerConfig::new());
    runner.execute(&matrix(&yaml)).await;

    let executed = state.executed.lock().unwrap().clone();
    let env_a = &executed.iter().find(|(_, c)| c == "echo a").unwrap().0;
    let env_b = &executed.iter().find(|(_, c)| c == "echo b").unwrap().0;
    assert_ne!(env_a, env_b);
}

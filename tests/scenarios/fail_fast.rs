//! Test: Fail-fast - a failing command stops its pipeline

use crate::helpers::*;
use pipeline_matrix::core::Verdict;
use pipeline_matrix::execution::RunnerConfig;
use std::time::Duration;

/// The two-pipeline scenario: A fails on its second command, B succeeds
#[tokio::test]
async fn test_failing_pipeline_and_passing_pipeline() {
    let yaml = simple_yaml(&[("A", &["echo 1", "exit 1", "echo 2"]), ("B", &["echo ok"])]);
    let (result, state) = run_yaml(&yaml, RunnerConfig::new()).await;

    assert_eq!(result.pipelines.len(), 2);

    let a = pipeline(&result, "A");
    assert_eq!(a.verdict, Verdict::Failed);
    assert_eq!(executed(&result, "A"), vec!["echo 1", "exit 1"]);
    assert_eq!(a.commands[0].exit_code, 0);
    assert_eq!(a.commands[1].exit_code, 1);

    assert_verdict(&result, "B", Verdict::Success);
    assert_eq!(executed(&result, "B"), vec!["echo ok"]);

    assert_eq!(result.verdict, Verdict::Failed);
    assert!(!state.executed_commands().contains(&"echo 2".to_string()));
}

/// Command count equals the index of the first failure, inclusive
#[tokio::test]
async fn test_first_command_failure_runs_nothing_else() {
    let yaml = simple_yaml(&[("A", &["exit 7", "pip install humann2", "humann2_test"])]);
    let (result, state) = run_yaml(&yaml, RunnerConfig::new()).await;

    assert_verdict(&result, "A", Verdict::Failed);
    assert_eq!(executed(&result, "A"), vec!["exit 7"]);
    assert_eq!(state.executed_commands(), vec!["exit 7"]);
}

/// A failure in one step means later steps are never provisioned
#[tokio::test]
async fn test_failure_skips_later_steps() {
    let yaml = r#"
pipelines:
  custom:
    build-then-test:
      - step:
          image: python:3.7
          script:
            - pip install humann2
            - exit 2
      - step:
          image: python:3.7
          script:
            - humann2_test
"#;
    let (result, state) = run_yaml(yaml, RunnerConfig::new()).await;

    assert_verdict(&result, "build-then-test", Verdict::Failed);
    assert_eq!(state.acquires(), 1);
    assert_eq!(executed(&result, "build-then-test"), vec!["pip install humann2", "exit 2"]);
    state.assert_no_leaks();
}

/// A timed-out command fails the pipeline and stops it
#[tokio::test]
async fn test_timeout_fails_pipeline() {
    let yaml = simple_yaml(&[("slow", &["sleep 5000", "echo never"])]);
    let config = RunnerConfig::new().with_default_timeout(Duration::from_millis(20));
    let (result, _) = run_yaml(&yaml, config).await;

    let slow = pipeline(&result, "slow");
    assert_eq!(slow.verdict, Verdict::Failed);
    assert_eq!(slow.commands.len(), 1);
    assert!(slow.commands[0].timed_out);
    assert_eq!(slow.commands[0].exit_code, -1);
}

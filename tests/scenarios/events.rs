//! Test: Runner events - emitted in order for each pipeline

use crate::helpers::*;
use pipeline_matrix::core::Verdict;
use pipeline_matrix::execution::{RunnerConfig, RunnerEvent};

#[tokio::test]
async fn test_event_sequence_for_one_pipeline() {
    let yaml = simple_yaml(&[("A", &["echo 1", "exit 1", "echo 2"])]);
    let (_, events) = run_yaml_with_events(&yaml, RunnerConfig::new()).await;

    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            RunnerEvent::PipelineStarted { .. } => "pipeline-started",
            RunnerEvent::EnvironmentAcquired { .. } => "environment",
            RunnerEvent::CommandStarted { .. } => "command-started",
            RunnerEvent::CommandFinished { .. } => "command-finished",
            RunnerEvent::PipelineFinished { .. } => "pipeline-finished",
        })
        .collect();

    assert_eq!(
        kinds,
        vec![
            "pipeline-started",
            "environment",
            "command-started",
            "command-finished",
            "command-started",
            "command-finished",
            "pipeline-finished",
        ]
    );

    match events.last() {
        Some(RunnerEvent::PipelineFinished { pipeline, verdict, .. }) => {
            assert_eq!(pipeline, "A");
            assert_eq!(*verdict, Verdict::Failed);
        }
        other => panic!("expected PipelineFinished, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pending_pipelines_still_finish_with_an_event() {
    let yaml = simple_yaml(&[("a", &["echo 1"]), ("b", &["echo 2"])]);
    let (result, events) = run_yaml_with_events(&yaml, RunnerConfig::new()).await;

    let finished = events
        .iter()
        .filter(|e| matches!(e, RunnerEvent::PipelineFinished { .. }))
        .count();
    assert_eq!(finished, result.pipelines.len());
}

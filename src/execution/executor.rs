//! Step executor - runs one pipeline's commands in order, failing fast

use crate::{
    core::{CommandResult, Pipeline, PipelineResult, Step},
    environment::{ExecutionEnvironment, Lease, LeaseSet, Provisioner},
    execution::events::{EventSink, RunnerEvent},
};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How one step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Every command exited zero
    Passed,
    /// A command exited non-zero or timed out; later commands did not run
    Failed,
    /// The environment could not run a command
    Errored(String),
    /// The run was cancelled before the step finished
    Cancelled,
}

/// Executes pipelines, one command at a time
pub struct StepExecutor {
    default_timeout: Option<Duration>,
    events: EventSink,
}

impl StepExecutor {
    pub fn new(default_timeout: Option<Duration>, events: EventSink) -> Self {
        Self {
            default_timeout,
            events,
        }
    }

    /// Run every step of `pipeline`, each in a freshly acquired environment
    ///
    /// Step environments are acquired in order and released before the next
    /// step is provisioned. Every lease is also tracked in `leases` so the
    /// caller can release anything left if this future is dropped.
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        provisioner: &dyn Provisioner,
        leases: &LeaseSet,
        cancel: &CancellationToken,
    ) -> PipelineResult {
        let started = Instant::now();
        let mut commands = Vec::with_capacity(pipeline.command_count());

        for (index, step) in pipeline.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                return PipelineResult::errored(pipeline, "cancelled", commands, started.elapsed());
            }

            // not raced against cancellation: an acquire interrupted halfway
            // could leave an environment nobody holds a lease for
            let lease = match Lease::acquire(provisioner, &step.image).await {
                Ok(lease) => lease,
                Err(e) => {
                    error!("Pipeline {}: {}", pipeline.name, e);
                    return PipelineResult::errored(pipeline, e.to_string(), commands, started.elapsed());
                }
            };
            leases.track(lease.clone()).await;

            self.events.emit(RunnerEvent::EnvironmentAcquired {
                pipeline: pipeline.name.clone(),
                step: index,
                image: step.image.clone(),
                environment_id: lease.environment().id().to_string(),
            });

            let outcome = self
                .run_step(pipeline, index, step, lease.environment(), &mut commands, cancel)
                .await;
            lease.release().await;

            match outcome {
                StepOutcome::Passed => continue,
                StepOutcome::Failed => break,
                StepOutcome::Errored(reason) => {
                    return PipelineResult::errored(pipeline, reason, commands, started.elapsed());
                }
                StepOutcome::Cancelled => {
                    return PipelineResult::errored(pipeline, "cancelled", commands, started.elapsed());
                }
            }
        }

        PipelineResult::finished(pipeline, commands, started.elapsed())
    }

    /// Run one step's commands in `env`, stopping at the first failure
    ///
    /// Results of executed commands are appended to `results`, including the
    /// failing one.
    pub async fn run_step(
        &self,
        pipeline: &Pipeline,
        index: usize,
        step: &Step,
        env: &dyn ExecutionEnvironment,
        results: &mut Vec<CommandResult>,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        info!(
            "Pipeline {}: running {} in {}",
            pipeline.name,
            step.display_name(index),
            env.id()
        );
        let timeout = step.timeout.or(self.default_timeout);

        for command in &step.commands {
            if cancel.is_cancelled() {
                return StepOutcome::Cancelled;
            }

            self.events.emit(RunnerEvent::CommandStarted {
                pipeline: pipeline.name.clone(),
                step: index,
                command: command.clone(),
            });
            debug!("Pipeline {}: + {}", pipeline.name, command);

            let started = Instant::now();
            let output = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Pipeline {}: cancelled during '{}'", pipeline.name, command);
                    return StepOutcome::Cancelled;
                }
                output = env.exec(command, timeout) => output,
            };

            let output = match output {
                Ok(output) => output,
                Err(e) => {
                    error!("Pipeline {}: {}", pipeline.name, e);
                    return StepOutcome::Errored(e.to_string());
                }
            };

            let result = CommandResult::new(index, command, output, started.elapsed());
            self.events.emit(RunnerEvent::CommandFinished {
                pipeline: pipeline.name.clone(),
                step: index,
                command: command.clone(),
                exit_code: result.exit_code,
                timed_out: result.timed_out,
                duration: result.duration,
            });

            let succeeded = result.succeeded();
            results.push(result);

            if !succeeded {
                warn!("Pipeline {}: '{}' failed, skipping remaining commands", pipeline.name, command);
                return StepOutcome::Failed;
            }
        }

        StepOutcome::Passed
    }
}

//! Matrix runner - runs every pipeline of a matrix concurrently

use crate::{
    core::{MatrixResult, Pipeline, PipelineMatrix, PipelineResult},
    environment::{LeaseSet, Provisioner},
    execution::{
        events::{EventHandler, EventSink, RunnerEvent},
        executor::StepExecutor,
        scheduler::SchedulingStrategy,
    },
};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Configuration for the matrix runner
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// How many pipelines may run at once
    pub strategy: SchedulingStrategy,

    /// Per-command timeout for steps that do not declare their own
    pub default_timeout: Option<Duration>,
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: SchedulingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Bound concurrency; 0 means unbounded
    pub fn with_concurrency(self, limit: usize) -> Self {
        self.with_strategy(SchedulingStrategy::from_limit(limit))
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }
}

/// A pipeline slot in matrix order
struct Scheduled {
    pipeline: Pipeline,
    leases: LeaseSet,
    /// Spawn time and task, `None` when cancelled before start
    handle: Option<(Instant, JoinHandle<PipelineResult>)>,
}

/// Runs every pipeline of a matrix and collects their results
pub struct MatrixRunner<P> {
    provisioner: Arc<P>,
    config: RunnerConfig,
    handlers: Vec<EventHandler>,
    cancel: CancellationToken,
}

impl<P: Provisioner + 'static> MatrixRunner<P> {
    pub fn new(provisioner: P, config: RunnerConfig) -> Self {
        Self {
            provisioner: Arc::new(provisioner),
            config,
            handlers: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(RunnerEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    /// Token that cancels the run when triggered
    ///
    /// Pipelines not yet started are skipped; running pipelines stop after
    /// their current command is interrupted and release their environments.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Execute every pipeline in `matrix`
    ///
    /// Never fails as a whole: each pipeline's failure, error or panic is
    /// recorded in its own result. Results come back in matrix order.
    pub async fn execute(&self, matrix: &PipelineMatrix) -> MatrixResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let permits = self.config.strategy.permits(matrix.len());

        info!(
            "Starting matrix run {} ({} pipelines, {} at a time)",
            run_id,
            matrix.len(),
            permits
        );

        let events = EventSink::new(self.handlers.clone());
        let executor = Arc::new(StepExecutor::new(self.config.default_timeout, events.clone()));
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut scheduled = Vec::with_capacity(matrix.len());
        for pipeline in matrix.pipelines() {
            let leases = LeaseSet::new();

            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };

            let handle = permit.map(|permit| {
                let pipeline = pipeline.clone();
                let provisioner = self.provisioner.clone();
                let executor = executor.clone();
                let events = events.clone();
                let leases = leases.clone();
                let cancel = self.cancel.clone();

                let started = Instant::now();
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    events.emit(RunnerEvent::PipelineStarted {
                        pipeline: pipeline.name.clone(),
                    });

                    let result = executor
                        .run(&pipeline, provisioner.as_ref(), &leases, &cancel)
                        .await;

                    events.emit(RunnerEvent::PipelineFinished {
                        pipeline: pipeline.name.clone(),
                        verdict: result.verdict,
                        duration: result.duration,
                    });
                    result
                });
                (started, handle)
            });

            scheduled.push(Scheduled {
                pipeline: pipeline.clone(),
                leases,
                handle,
            });
        }

        let mut results = Vec::with_capacity(scheduled.len());
        for slot in scheduled {
            results.push(self.collect(slot, &events).await);
        }

        let result = MatrixResult::new(run_id, started_at, self.cancel.is_cancelled(), results);
        info!(
            "Matrix run {} finished: {:?} ({} pipelines)",
            run_id,
            result.verdict,
            result.pipelines.len()
        );
        result
    }

    async fn collect(&self, slot: Scheduled, events: &EventSink) -> PipelineResult {
        let Scheduled {
            pipeline,
            leases,
            handle,
        } = slot;

        let Some((started, handle)) = handle else {
            info!("Pipeline {} cancelled before start", pipeline.name);
            let result = PipelineResult::errored(&pipeline, "cancelled before start", Vec::new(), Duration::ZERO);
            events.emit(RunnerEvent::PipelineFinished {
                pipeline: pipeline.name.clone(),
                verdict: result.verdict,
                duration: result.duration,
            });
            return result;
        };

        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Pipeline {} task failed: {}", pipeline.name, e);
                let result = PipelineResult::errored(
                    &pipeline,
                    format!("pipeline task panicked: {}", e),
                    Vec::new(),
                    started.elapsed(),
                );
                events.emit(RunnerEvent::PipelineFinished {
                    pipeline: pipeline.name.clone(),
                    verdict: result.verdict,
                    duration: result.duration,
                });
                result
            }
        };

        let swept = leases.release_all().await;
        if swept > 0 {
            warn!("Pipeline {}: released {} leftover environment(s)", pipeline.name, swept);
        }
        result
    }
}

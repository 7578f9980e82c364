//! Test utilities for pipeline-matrix
#![allow(dead_code)]

use pipeline_matrix::core::{CommandOutput, MatrixResult, PipelineMatrix, PipelineResult, Verdict};
use pipeline_matrix::environment::{ExecutionEnvironment, Provisioner};
use pipeline_matrix::error::{ExecutionError, ProvisionError};
use pipeline_matrix::execution::{MatrixRunner, RunnerConfig, RunnerEvent};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counters shared by a mock provisioner and every environment it hands out
#[derive(Default)]
pub struct MockState {
    pub acquires: AtomicUsize,
    pub teardowns: AtomicUsize,
    pub double_teardowns: AtomicUsize,
    pub live: AtomicUsize,
    pub peak: AtomicUsize,
    /// (environment id, command) in execution order
    pub executed: Mutex<Vec<(String, String)>>,
}

impl MockState {
    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }

    pub fn double_teardowns(&self) -> usize {
        self.double_teardowns.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn executed_commands(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// Every acquired environment was torn down exactly once
    pub fn assert_no_leaks(&self) {
        assert_eq!(self.acquires(), self.teardowns(), "acquires and teardowns differ");
        assert_eq!(self.double_teardowns(), 0, "an environment was torn down twice");
        assert_eq!(self.live(), 0, "environments still live");
    }
}

/// Provisioner whose environments interpret a tiny command language
///
/// - `exit N` exits with status N
/// - `sleep MS` sleeps, honouring the command timeout
/// - `echo TEXT` prints TEXT
/// - `lose-environment` fails as if the environment vanished
/// - `panic` panics inside the pipeline task
/// - anything else succeeds silently
///
/// Images starting with `missing` fail to provision.
#[derive(Clone, Default)]
pub struct MockProvisioner {
    pub state: Arc<MockState>,
    acquire_delay: Option<Duration>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = Some(delay);
        self
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn acquire(&self, image: &str) -> Result<Box<dyn ExecutionEnvironment>, ProvisionError> {
        if let Some(delay) = self.acquire_delay {
            tokio::time::sleep(delay).await;
        }

        if image.starts_with("missing") {
            return Err(ProvisionError::Unavailable {
                image: image.to_string(),
                reason: "manifest unknown".to_string(),
            });
        }

        let n = self.state.acquires.fetch_add(1, Ordering::SeqCst);
        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(MockEnvironment {
            id: format!("mock-{}", n),
            image: image.to_string(),
            state: self.state.clone(),
            torn_down: AtomicUsize::new(0),
        }))
    }
}

pub struct MockEnvironment {
    id: String,
    image: String,
    state: Arc<MockState>,
    torn_down: AtomicUsize,
}

#[async_trait]
impl ExecutionEnvironment for MockEnvironment {
    fn id(&self) -> &str {
        &self.id
    }

    fn image(&self) -> &str {
        &self.image
    }

    async fn exec(&self, command: &str, timeout: Option<Duration>) -> Result<CommandOutput, ExecutionError> {
        self.state
            .executed
            .lock()
            .unwrap()
            .push((self.id.clone(), command.to_string()));

        if command == "panic" {
            panic!("mock environment asked to panic");
        }
        if command == "lose-environment" {
            return Err(ExecutionError::EnvironmentLost {
                id: self.id.clone(),
                reason: "connection reset".to_string(),
            });
        }
        if let Some(code) = command.strip_prefix("exit ") {
            return Ok(CommandOutput {
                exit_code: code.trim().parse().unwrap_or(1),
                ..CommandOutput::default()
            });
        }
        if let Some(ms) = command.strip_prefix("sleep ") {
            let wanted = Duration::from_millis(ms.trim().parse().unwrap_or(0));
            return Ok(match timeout {
                Some(limit) if limit < wanted => {
                    tokio::time::sleep(limit).await;
                    CommandOutput::timed_out()
                }
                _ => {
                    tokio::time::sleep(wanted).await;
                    CommandOutput::default()
                }
            });
        }
        if let Some(text) = command.strip_prefix("echo ") {
            return Ok(CommandOutput {
                stdout: format!("{}\n", text),
                ..CommandOutput::default()
            });
        }
        Ok(CommandOutput::default())
    }

    async fn teardown(&self) -> Result<(), ProvisionError> {
        if self.torn_down.fetch_add(1, Ordering::SeqCst) > 0 {
            self.state.double_teardowns.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        self.state.teardowns.fetch_add(1, Ordering::SeqCst);
        self.state.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Parse a matrix definition, panicking on config errors
pub fn matrix(yaml: &str) -> PipelineMatrix {
    pipeline_matrix::load(yaml).expect("test matrix should be valid")
}

/// Run `yaml` against a fresh mock provisioner
pub async fn run_yaml(yaml: &str, config: RunnerConfig) -> (MatrixResult, Arc<MockState>) {
    let provisioner = MockProvisioner::new();
    let state = provisioner.state.clone();
    let runner = MatrixRunner::new(provisioner, config);
    let result = runner.execute(&matrix(yaml)).await;
    (result, state)
}

/// Run `yaml` and also collect every runner event
pub async fn run_yaml_with_events(yaml: &str, config: RunnerConfig) -> (MatrixResult, Vec<RunnerEvent>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut runner = MatrixRunner::new(MockProvisioner::new(), config);
    {
        let events = events.clone();
        runner.add_event_handler(move |event| events.lock().unwrap().push(event));
    }
    let result = runner.execute(&matrix(yaml)).await;
    let events = events.lock().unwrap().clone();
    (result, events)
}

pub fn pipeline<'a>(result: &'a MatrixResult, name: &str) -> &'a PipelineResult {
    result
        .pipeline(name)
        .unwrap_or_else(|| panic!("no result for pipeline '{}'", name))
}

/// Commands a pipeline actually executed, in order
pub fn executed(result: &MatrixResult, name: &str) -> Vec<String> {
    pipeline(result, name)
        .commands
        .iter()
        .map(|c| c.command.clone())
        .collect()
}

pub fn assert_verdict(result: &MatrixResult, name: &str, expected: Verdict) {
    let actual = pipeline(result, name);
    assert_eq!(
        actual.verdict, expected,
        "pipeline '{}' verdict (error: {:?})",
        name, actual.error
    );
}

/// A single-group matrix of single-step pipelines, one per `(name, commands)`
pub fn simple_yaml(pipelines: &[(&str, &[&str])]) -> String {
    let mut yaml = String::from("image: alpine\npipelines:\n  custom:\n");
    for (name, commands) in pipelines {
        yaml.push_str(&format!("    {}:\n      - step:\n          script:\n", name));
        for command in commands.iter() {
            yaml.push_str(&format!("            - \"{}\"\n", command));
        }
    }
    yaml
}

//! Execution result models

use crate::core::matrix::Pipeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Outcome of a pipeline, or of a whole matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Every command exited zero
    Success,
    /// A command ran and exited non-zero (or timed out)
    Failed,
    /// The pipeline could not run: provisioning failed, the environment broke,
    /// or the run was cancelled
    Errored,
}

impl Verdict {
    pub fn is_success(self) -> bool {
        self == Verdict::Success
    }
}

/// Raw output of one command as reported by an execution environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Output for a command killed after exceeding its timeout
    pub fn timed_out() -> Self {
        Self {
            exit_code: -1,
            timed_out: true,
            ..Self::default()
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Result of one executed command (immutable once produced)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Index of the step the command belongs to
    pub step: usize,
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    pub timed_out: bool,
}

impl CommandResult {
    pub fn new(step: usize, command: &str, output: CommandOutput, duration: Duration) -> Self {
        Self {
            step,
            command: command.to_string(),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            duration,
            timed_out: output.timed_out,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Last `lines` lines of stdout followed by stderr
    pub fn output_tail(&self, lines: usize) -> Vec<&str> {
        let all: Vec<&str> = self.stdout.lines().chain(self.stderr.lines()).collect();
        let start = all.len().saturating_sub(lines);
        all[start..].to_vec()
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub name: String,
    pub group: String,
    pub verdict: Verdict,
    /// Why the pipeline errored, if it did
    pub error: Option<String>,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    pub duration: Duration,
    /// Commands actually executed, in order; a prefix of the declared ones
    /// when the pipeline stopped early
    pub commands: Vec<CommandResult>,
}

impl PipelineResult {
    /// A pipeline that ran to an outcome
    pub fn finished(pipeline: &Pipeline, commands: Vec<CommandResult>, duration: Duration) -> Self {
        let verdict = if commands.iter().all(CommandResult::succeeded) {
            Verdict::Success
        } else {
            Verdict::Failed
        };
        Self {
            name: pipeline.name.clone(),
            group: pipeline.group.clone(),
            verdict,
            error: None,
            duration,
            commands,
        }
    }

    /// A pipeline that could not run to an outcome
    pub fn errored(
        pipeline: &Pipeline,
        error: impl Into<String>,
        commands: Vec<CommandResult>,
        duration: Duration,
    ) -> Self {
        Self {
            name: pipeline.name.clone(),
            group: pipeline.group.clone(),
            verdict: Verdict::Errored,
            error: Some(error.into()),
            duration,
            commands,
        }
    }

    /// The command that failed the pipeline, if any
    pub fn first_failure(&self) -> Option<&CommandResult> {
        self.commands.iter().find(|c| !c.succeeded())
    }

    pub fn is_success(&self) -> bool {
        self.verdict.is_success()
    }
}

/// Result of a whole matrix run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cancelled: bool,
    /// Success iff every pipeline succeeded
    pub verdict: Verdict,
    /// One entry per declared pipeline, in matrix order
    pub pipelines: Vec<PipelineResult>,
}

impl MatrixResult {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        cancelled: bool,
        pipelines: Vec<PipelineResult>,
    ) -> Self {
        let verdict = if pipelines.iter().all(PipelineResult::is_success) {
            Verdict::Success
        } else {
            Verdict::Failed
        };
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            cancelled,
            verdict,
            pipelines,
        }
    }

    /// Look up a pipeline's result by name
    pub fn pipeline(&self, name: &str) -> Option<&PipelineResult> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    pub fn count(&self, verdict: Verdict) -> usize {
        self.pipelines.iter().filter(|p| p.verdict == verdict).count()
    }
}

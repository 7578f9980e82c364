//! pipeline-matrix - runs a declared matrix of CI pipelines in isolated environments

pub mod cli;
pub mod core;
pub mod environment;
pub mod error;
pub mod execution;
pub mod report;

// Re-export commonly used types
pub use crate::core::{load, load_file, MatrixResult, Pipeline, PipelineMatrix, PipelineResult, Step, Verdict};
pub use environment::{DockerProvisioner, ExecutionEnvironment, LocalProvisioner, Provisioner};
pub use error::{ConfigError, ExecutionError, ProvisionError};
pub use execution::{MatrixRunner, RunnerConfig, RunnerEvent, SchedulingStrategy};
pub use report::summarize;

//! Core domain: matrix model, configuration loading and results

pub mod config;
pub mod generator;
pub mod matrix;
pub mod result;

pub use config::{load, load_file, MatrixConfig};
pub use matrix::{Pipeline, PipelineGroup, PipelineMatrix, Step};
pub use result::{CommandOutput, CommandResult, MatrixResult, PipelineResult, Verdict};

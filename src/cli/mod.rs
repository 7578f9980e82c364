//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{ListCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Runs a declared pipeline matrix in isolated environments
#[derive(Debug, Parser, Clone)]
#[command(name = "pipeline-matrix")]
#[command(version)]
#[command(about = "Run a declarative pipeline matrix with isolated environments", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the pipelines of a matrix definition
    Run(RunCommand),

    /// Validate a matrix definition without running it
    Validate(ValidateCommand),

    /// List the pipelines a matrix definition declares
    List(ListCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

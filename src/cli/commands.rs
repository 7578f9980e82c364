//! CLI command definitions

use crate::environment::{DockerConfig, DockerProvisioner, LocalConfig, LocalProvisioner};
use clap::Args;

/// Run the pipelines of a matrix definition
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to the matrix definition, or `-` for stdin
    #[arg(short, long)]
    pub file: String,

    /// Only run the named pipeline (repeatable)
    #[arg(short, long)]
    pub pipeline: Vec<String>,

    /// Only run pipelines of the named group (repeatable)
    #[arg(short, long)]
    pub group: Vec<String>,

    /// Maximum number of pipelines running at once (0 = unbounded)
    #[arg(short = 'j', long, default_value_t = 4)]
    pub concurrency: usize,

    /// Default per-command timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Cancel the whole run after this many seconds
    #[arg(long)]
    pub max_time: Option<u64>,

    /// How execution environments are provisioned
    #[arg(long, value_enum, default_value_t = ProvisionerArg::Local)]
    pub provisioner: ProvisionerArg,

    /// Docker CLI binary used by the docker provisioner
    #[arg(long, default_value = "docker")]
    pub docker_bin: String,

    /// Extra argument passed to `docker run` (repeatable)
    #[arg(long, allow_hyphen_values = true)]
    pub docker_arg: Vec<String>,

    /// Write the machine-readable result as JSON to this path
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Validate a matrix definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to the matrix definition, or `-` for stdin
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List declared pipelines
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Path to the matrix definition, or `-` for stdin
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Provisioner argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProvisionerArg {
    /// Fresh workspace directory on this host per environment
    Local,
    /// Fresh container per environment
    Docker,
}

impl RunCommand {
    pub fn local_provisioner(&self) -> LocalProvisioner {
        LocalProvisioner::new(LocalConfig::new())
    }

    pub fn docker_provisioner(&self) -> DockerProvisioner {
        let config = self
            .docker_arg
            .iter()
            .fold(DockerConfig::new().with_binary(&self.docker_bin), |config, arg| {
                config.with_run_arg(arg)
            });
        DockerProvisioner::new(config)
    }
}

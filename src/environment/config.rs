//! Provisioner configuration

use std::path::PathBuf;

/// Configuration for the local (workspace directory) provisioner
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Shell used to interpret commands
    pub shell: String,

    /// Directory new workspaces are created in (system temp dir if unset)
    pub base_dir: Option<PathBuf>,

    /// Extra variables exported into every environment
    pub env: Vec<(String, String)>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            base_dir: None,
            env: Vec::new(),
        }
    }
}

impl LocalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Configuration for the Docker provisioner
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Path to the docker CLI
    pub binary: String,

    /// Shell used inside containers
    pub shell: String,

    /// Working directory inside containers
    pub workdir: String,

    /// Extra arguments passed to `docker run`
    pub run_args: Vec<String>,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            shell: "sh".to_string(),
            workdir: "/workspace".to_string(),
            run_args: Vec::new(),
        }
    }
}

impl DockerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_run_arg(mut self, arg: impl Into<String>) -> Self {
        self.run_args.push(arg.into());
        self
    }
}

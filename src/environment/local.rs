//! Local provisioner - one fresh workspace directory per environment
//!
//! The environment reference is recorded but not resolved: commands run on
//! the host through the configured shell. Each environment still gets its
//! own working directory, `HOME`, `TMPDIR`, `bin/` on `PATH` and session
//! state, and starts from an explicit variable set instead of inheriting the
//! caller's environment.

use crate::core::CommandOutput;
use crate::environment::process::{self, ProcessGroups};
use crate::environment::{session_script, ExecutionEnvironment, LocalConfig, Provisioner, STATE_VAR};
use crate::error::{ExecutionError, ProvisionError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Provisions workspace directories on the local host
#[derive(Debug, Clone, Default)]
pub struct LocalProvisioner {
    config: LocalConfig,
}

impl LocalProvisioner {
    pub fn new(config: LocalConfig) -> Self {
        Self { config }
    }

    fn create_workspace(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pipeline-matrix-");
        match &self.config.base_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        }
    }
}

#[async_trait]
impl Provisioner for LocalProvisioner {
    async fn acquire(&self, image: &str) -> Result<Box<dyn ExecutionEnvironment>, ProvisionError> {
        let unavailable = |e: std::io::Error| ProvisionError::Unavailable {
            image: image.to_string(),
            reason: e.to_string(),
        };

        let workspace = self.create_workspace().map_err(unavailable)?;
        let root = workspace.path().to_path_buf();
        for dir in ["work", "home", "tmp", "bin", "state"] {
            std::fs::create_dir_all(root.join(dir)).map_err(unavailable)?;
        }

        let env = LocalEnvironment {
            id: format!("local-{}", Uuid::new_v4().simple()),
            image: image.to_string(),
            shell: self.config.shell.clone(),
            vars: environment_vars(&root, image, &self.config.env),
            workdir: root.join("work"),
            workspace: Mutex::new(Some(workspace)),
            groups: ProcessGroups::default(),
        };
        debug!("Created local workspace {} for {}", root.display(), image);

        Ok(Box::new(env))
    }
}

fn environment_vars(root: &Path, image: &str, extra: &[(String, String)]) -> Vec<(String, String)> {
    let host_path = std::env::var("PATH").unwrap_or_else(|_| "/usr/local/bin:/usr/bin:/bin".to_string());

    let mut vars = vec![
        ("PATH".to_string(), format!("{}:{}", root.join("bin").display(), host_path)),
        ("HOME".to_string(), root.join("home").display().to_string()),
        ("TMPDIR".to_string(), root.join("tmp").display().to_string()),
        (STATE_VAR.to_string(), root.join("state").display().to_string()),
        ("PIPELINE_IMAGE".to_string(), image.to_string()),
        ("CI".to_string(), "true".to_string()),
    ];
    vars.extend(extra.iter().cloned());
    vars
}

/// A workspace directory on the local host
pub struct LocalEnvironment {
    id: String,
    image: String,
    shell: String,
    vars: Vec<(String, String)>,
    workdir: PathBuf,
    workspace: Mutex<Option<TempDir>>,
    groups: ProcessGroups,
}

#[async_trait]
impl ExecutionEnvironment for LocalEnvironment {
    fn id(&self) -> &str {
        &self.id
    }

    fn image(&self) -> &str {
        &self.image
    }

    async fn exec(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecutionError> {
        if self.workspace.lock().await.is_none() {
            return Err(ExecutionError::EnvironmentLost {
                id: self.id.clone(),
                reason: "workspace already released".to_string(),
            });
        }
        if !self.workdir.is_dir() {
            return Err(ExecutionError::EnvironmentLost {
                id: self.id.clone(),
                reason: format!("{} no longer exists", self.workdir.display()),
            });
        }

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(session_script(command))
            .current_dir(&self.workdir)
            .env_clear()
            .envs(self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        process::run_tracked(cmd, timeout, Some(&self.groups))
            .await
            .map_err(|e| ExecutionError::Spawn(format!("{}: {}", self.shell, e)))
    }

    async fn teardown(&self) -> Result<(), ProvisionError> {
        self.groups.kill_all();
        let workspace = self.workspace.lock().await.take();
        match workspace {
            Some(dir) => dir.close().map_err(|e| ProvisionError::Release {
                id: self.id.clone(),
                reason: e.to_string(),
            }),
            None => Ok(()),
        }
    }
}

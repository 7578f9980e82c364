//! Docker provisioner - one container per environment, driven through the docker CLI
//!
//! ```text
//! acquire:  docker run -d --rm --entrypoint "" -w <workdir> <image> tail -f /dev/null
//! exec:     docker exec -w <workdir> -e PIPELINE_MATRIX_STATE=... <id> sh -c <script>
//! release:  docker rm -f <id>
//! ```

use crate::core::CommandOutput;
use crate::environment::{process, session_script, DockerConfig, ExecutionEnvironment, Provisioner, STATE_VAR};
use crate::error::{ExecutionError, ProvisionError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Session state location inside every container
const CONTAINER_STATE_DIR: &str = "/tmp/.pipeline-matrix";

/// Provisions one container per environment
#[derive(Debug, Clone, Default)]
pub struct DockerProvisioner {
    config: DockerConfig,
}

impl DockerProvisioner {
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    fn run_command(&self, image: &str) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(["run", "-d", "--rm", "--entrypoint", ""])
            .args(["-w", self.config.workdir.as_str()])
            .args(["--label", "pipeline-matrix=1"])
            .args(&self.config.run_args)
            .arg(image)
            .args(["tail", "-f", "/dev/null"]);
        cmd
    }
}

/// Docker container IDs are 1-64 hex characters
fn validate_container_id(id: &str) -> Result<(), String> {
    if id.is_empty() || id.len() > 64 {
        return Err(format!("invalid container ID: length {} (must be 1-64)", id.len()));
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid container ID: {:?}", id));
    }
    Ok(())
}

/// Recognise `docker exec` failures that come from docker, not the command
fn classify_exec_failure(id: &str, output: &CommandOutput) -> Option<ExecutionError> {
    if output.exit_code == 0 || output.timed_out {
        return None;
    }

    let stderr = output.stderr.trim();
    if stderr.contains("OCI runtime exec failed") {
        return Some(ExecutionError::Spawn(stderr.to_string()));
    }
    if stderr.starts_with("Error response from daemon") || stderr.starts_with("Error: No such container") {
        return Some(ExecutionError::EnvironmentLost {
            id: id.to_string(),
            reason: stderr.to_string(),
        });
    }
    None
}

#[async_trait]
impl Provisioner for DockerProvisioner {
    async fn acquire(&self, image: &str) -> Result<Box<dyn ExecutionEnvironment>, ProvisionError> {
        debug!("Starting container from {}", image);

        let output = process::run(self.run_command(image), None)
            .await
            .map_err(|e| ProvisionError::Runtime(format!("{}: {}", self.config.binary, e)))?;

        if output.exit_code != 0 {
            return Err(ProvisionError::Unavailable {
                image: image.to_string(),
                reason: output.stderr.trim().to_string(),
            });
        }

        let id = output.stdout.trim().to_string();
        validate_container_id(&id).map_err(|reason| ProvisionError::Unavailable {
            image: image.to_string(),
            reason,
        })?;

        let env = DockerEnvironment {
            id,
            image: image.to_string(),
            config: self.config.clone(),
        };

        // session state directory; a container without a shell fails here
        let prepared = env
            .docker_exec(&format!("mkdir -p {}", CONTAINER_STATE_DIR), None)
            .await;
        match prepared {
            Ok(out) if out.exit_code == 0 => Ok(Box::new(env)),
            Ok(out) => {
                let reason = out.stderr.trim().to_string();
                env.teardown().await.ok();
                Err(ProvisionError::Unavailable {
                    image: image.to_string(),
                    reason,
                })
            }
            Err(e) => {
                env.teardown().await.ok();
                Err(ProvisionError::Unavailable {
                    image: image.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// A running container
pub struct DockerEnvironment {
    id: String,
    image: String,
    config: DockerConfig,
}

impl DockerEnvironment {
    async fn docker_exec(
        &self,
        script: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecutionError> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.arg("exec")
            .args(["-w", self.config.workdir.as_str()])
            .arg("-e")
            .arg(format!("{}={}", STATE_VAR, CONTAINER_STATE_DIR))
            .arg("-e")
            .arg(format!("PIPELINE_IMAGE={}", self.image))
            .args(["-e", "CI=true"])
            .arg(&self.id)
            .args([self.config.shell.as_str(), "-c", script]);

        let output = process::run(cmd, timeout)
            .await
            .map_err(|e| ExecutionError::Spawn(format!("{}: {}", self.config.binary, e)))?;

        match classify_exec_failure(&self.id, &output) {
            Some(err) => Err(err),
            None => Ok(output),
        }
    }
}

#[async_trait]
impl ExecutionEnvironment for DockerEnvironment {
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
        self.docker_exec(&session_script(command), timeout).await
    }

    async fn teardown(&self) -> Result<(), ProvisionError> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(["rm", "-f", self.id.as_str()]);

        let output = process::run(cmd, None).await.map_err(|e| ProvisionError::Release {
            id: self.id.clone(),
            reason: e.to_string(),
        })?;

        if output.exit_code != 0 && !output.stderr.contains("No such container") {
            warn!("docker rm -f {} exited {}", self.id, output.exit_code);
            return Err(ProvisionError::Release {
                id: self.id.clone(),
                reason: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

//! Execution environments and the provisioners that create them

pub mod config;
pub mod docker;
pub mod lease;
pub mod local;
mod process;

use crate::core::CommandOutput;
use crate::error::{ExecutionError, ProvisionError};
use async_trait::async_trait;
use std::time::Duration;

pub use config::{DockerConfig, LocalConfig};
pub use docker::DockerProvisioner;
pub use lease::{Lease, LeaseSet};
pub use local::LocalProvisioner;

/// A live, isolated runtime instance bound to one environment reference
///
/// Commands in one environment share its filesystem, working directory and
/// exported variables. Nothing is shared between environments.
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    /// Unique identifier of this instance
    fn id(&self) -> &str;

    /// The environment reference it was provisioned from
    fn image(&self) -> &str;

    /// Run one shell command to completion
    ///
    /// A non-zero exit is a normal `Ok` result; `Err` means the command could
    /// not be run at all.
    async fn exec(
        &self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecutionError>;

    /// Destroy the instance. Called at most once, through [`Lease`].
    async fn teardown(&self) -> Result<(), ProvisionError>;
}

/// Acquires fresh execution environments from environment references
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Provision a new, independent environment. Never reuses instances.
    async fn acquire(&self, image: &str) -> Result<Box<dyn ExecutionEnvironment>, ProvisionError>;
}

/// Name of the variable pointing at an environment's session state directory
pub const STATE_VAR: &str = "PIPELINE_MATRIX_STATE";

/// Wrap a command so exported variables and the working directory carry
/// over to the next command run in the same environment
pub fn session_script(command: &str) -> String {
    format!(
        r#"if [ -f "${STATE_VAR}/env" ]; then . "${STATE_VAR}/env"; fi
if [ -f "${STATE_VAR}/cwd" ]; then cd "$(cat "${STATE_VAR}/cwd")"; fi
{command}
__pm_status=$?
export -p > "${STATE_VAR}/env"
pwd > "${STATE_VAR}/cwd"
exit $__pm_status
"#
    )
}

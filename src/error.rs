//! Error types for loading, provisioning and executing a pipeline matrix
//!
//! Only [`ConfigError`] is fatal to a whole run. [`ProvisionError`] and
//! [`ExecutionError`] are scoped to one pipeline and end up as that
//! pipeline's `Errored` verdict.

/// Malformed or invalid matrix definition
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The definition could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The definition is not valid YAML or does not have the expected shape
    #[error("invalid pipeline definition: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A group entry is malformed
    #[error("group '{group}': {reason}")]
    InvalidGroup { group: String, reason: String },

    /// A pipeline entry is malformed
    #[error("pipeline '{pipeline}': {reason}")]
    InvalidPipeline { pipeline: String, reason: String },

    /// Two pipelines share a name
    #[error("duplicate pipeline name '{0}'")]
    DuplicatePipeline(String),

    /// A generator entry cannot be expanded
    #[error("generator '{generator}': {reason}")]
    Generator { generator: String, reason: String },

    /// A document-level option has an unusable value
    #[error("options: {0}")]
    InvalidOption(String),

    /// Nothing to run
    #[error("no pipelines declared")]
    Empty,

    /// A filter names a pipeline the matrix does not declare
    #[error("unknown pipeline '{0}'")]
    UnknownPipeline(String),

    /// A filter names a group the matrix does not declare
    #[error("unknown group '{0}'")]
    UnknownGroup(String),
}

impl ConfigError {
    pub(crate) fn pipeline(pipeline: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidPipeline {
            pipeline: pipeline.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn group(group: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidGroup {
            group: group.into(),
            reason: reason.into(),
        }
    }
}

/// An execution environment could not be acquired or released
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProvisionError {
    /// The environment reference could not be resolved or started
    #[error("cannot provision '{image}': {reason}")]
    Unavailable { image: String, reason: String },

    /// The underlying runtime itself is not usable
    #[error("environment runtime error: {0}")]
    Runtime(String),

    /// Tearing an environment down failed
    #[error("failed to release environment {id}: {reason}")]
    Release { id: String, reason: String },
}

/// The environment could not run a command at all
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    /// The shell or process could not be started
    #[error("failed to start command: {0}")]
    Spawn(String),

    /// The environment stopped being usable mid-run
    #[error("environment {id} lost: {reason}")]
    EnvironmentLost { id: String, reason: String },
}

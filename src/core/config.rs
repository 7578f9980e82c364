//! Pipeline matrix configuration from YAML
//!
//! The document follows the Bitbucket Pipelines layout:
//!
//! ```yaml
//! image: python:3.7            # default for steps without an image
//! options:
//!   max-time: 60               # minutes, default per-command timeout
//! pipelines:
//!   custom:
//!     python3.7:
//!       - step:
//!           image: python:3.7
//!           script:
//!             - pip install humann2
//!             - humann2_test
//!   default:                   # a group whose value is a step list is one pipeline
//!     - step:
//!         script: [make test]
//! generate: []                 # see `core::generator`
//! ```

use crate::core::generator::GeneratorConfig;
use crate::core::matrix::{Pipeline, PipelineGroup, PipelineMatrix, Step};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::io::Read;
use std::time::Duration;

/// Top-level matrix definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Default environment reference for steps that omit one
    #[serde(default)]
    pub image: Option<String>,

    /// Global options
    #[serde(default)]
    pub options: Option<OptionsConfig>,

    /// group name -> (pipeline name -> steps) or group name -> steps
    #[serde(default)]
    pub pipelines: Mapping,

    /// Parameterized pipeline declarations
    #[serde(default)]
    pub generate: Vec<GeneratorConfig>,
}

/// Global options block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Default command timeout in minutes
    #[serde(default, rename = "max-time")]
    pub max_time: Option<u64>,
}

/// A `- step:` list entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEntry {
    pub step: StepConfig,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfig {
    /// Optional display name
    #[serde(default)]
    pub name: Option<String>,

    /// Environment reference (overrides the document default)
    #[serde(default)]
    pub image: Option<String>,

    /// Commands; kept untyped so non-string entries are reported precisely
    #[serde(default)]
    pub script: Option<Vec<Value>>,

    /// Command timeout in minutes (overrides `options.max-time`)
    #[serde(default, rename = "max-time")]
    pub max_time: Option<u64>,
}

/// Values a step inherits from the document
#[derive(Debug, Clone, Default)]
pub struct StepDefaults {
    pub image: Option<String>,
    pub timeout: Option<Duration>,
}

/// `max-time` minutes as a duration, `None` when it overflows
fn minutes(value: u64) -> Option<Duration> {
    value.checked_mul(60).map(Duration::from_secs)
}

/// Read a definition from a path, or from stdin when the path is `-`
pub fn read_source(path: &str) -> Result<String, ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: path.to_string(),
        source,
    };

    if path == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .map_err(io_error)?;
        Ok(content)
    } else {
        std::fs::read_to_string(path).map_err(io_error)
    }
}

/// Parse and validate a matrix definition
pub fn load(source: &str) -> Result<PipelineMatrix, ConfigError> {
    MatrixConfig::from_yaml(source)?.to_matrix()
}

/// Load a matrix definition from a path (or `-` for stdin)
pub fn load_file(path: &str) -> Result<PipelineMatrix, ConfigError> {
    load(&read_source(path)?)
}

impl MatrixConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    fn defaults(&self) -> Result<StepDefaults, ConfigError> {
        let timeout = match self.options.as_ref().and_then(|o| o.max_time) {
            Some(value) => Some(minutes(value).ok_or_else(|| {
                ConfigError::InvalidOption(format!("max-time {} is out of range", value))
            })?),
            None => None,
        };
        Ok(StepDefaults {
            image: self.image.clone(),
            timeout,
        })
    }

    /// Build the validated matrix, expanding generators
    pub fn to_matrix(&self) -> Result<PipelineMatrix, ConfigError> {
        let defaults = self.defaults()?;
        let mut groups: Vec<PipelineGroup> = Vec::new();

        for (key, value) in &self.pipelines {
            let group = key
                .as_str()
                .ok_or_else(|| ConfigError::group(format!("{:?}", key), "group name must be a string"))?;
            if group.trim().is_empty() {
                return Err(ConfigError::group(group, "group name is empty"));
            }

            let pipelines = match value {
                // Bitbucket `default:` form: the group is a single pipeline
                Value::Sequence(_) => vec![build_pipeline(group, group, value, &defaults)?],
                Value::Mapping(entries) => {
                    if entries.is_empty() {
                        return Err(ConfigError::group(group, "declares no pipelines"));
                    }
                    entries
                        .iter()
                        .map(|(name, steps)| {
                            let name = name.as_str().ok_or_else(|| {
                                ConfigError::group(group, "pipeline names must be strings")
                            })?;
                            build_pipeline(group, name, steps, &defaults)
                        })
                        .collect::<Result<Vec<_>, _>>()?
                }
                _ => {
                    return Err(ConfigError::group(
                        group,
                        "must map pipeline names to step lists",
                    ))
                }
            };

            groups.push(PipelineGroup {
                name: group.to_string(),
                pipelines,
            });
        }

        for generator in &self.generate {
            for generated in generator.expand()? {
                let pipeline = Pipeline {
                    steps: build_steps(&generated.name, &generated.steps, &defaults)?,
                    name: generated.name,
                    group: generated.group.clone(),
                };
                match groups.iter_mut().find(|g| g.name == generated.group) {
                    Some(group) => group.pipelines.push(pipeline),
                    None => groups.push(PipelineGroup {
                        name: generated.group,
                        pipelines: vec![pipeline],
                    }),
                }
            }
        }

        if groups.is_empty() {
            return Err(ConfigError::Empty);
        }

        PipelineMatrix::new(groups)
    }
}

fn build_pipeline(
    group: &str,
    name: &str,
    value: &Value,
    defaults: &StepDefaults,
) -> Result<Pipeline, ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::group(group, "pipeline name is empty"));
    }

    let entries: Vec<StepEntry> = serde_yaml::from_value(value.clone())
        .map_err(|e| ConfigError::pipeline(name, format!("expected a list of `- step:` entries ({})", e)))?;
    let steps: Vec<StepConfig> = entries.into_iter().map(|e| e.step).collect();

    Ok(Pipeline {
        name: name.to_string(),
        group: group.to_string(),
        steps: build_steps(name, &steps, defaults)?,
    })
}

fn build_steps(
    pipeline: &str,
    configs: &[StepConfig],
    defaults: &StepDefaults,
) -> Result<Vec<Step>, ConfigError> {
    if configs.is_empty() {
        return Err(ConfigError::pipeline(pipeline, "declares no steps"));
    }

    configs
        .iter()
        .enumerate()
        .map(|(index, config)| Step::from_config(pipeline, index, config, defaults))
        .collect()
}

impl Step {
    /// Create a step from its configuration, resolving defaults
    pub fn from_config(
        pipeline: &str,
        index: usize,
        config: &StepConfig,
        defaults: &StepDefaults,
    ) -> Result<Self, ConfigError> {
        let label = match &config.name {
            Some(name) => format!("step '{}'", name),
            None => format!("step {}", index + 1),
        };

        let image = config
            .image
            .clone()
            .or_else(|| defaults.image.clone())
            .ok_or_else(|| ConfigError::pipeline(pipeline, format!("{} has no image", label)))?;

        let script = config
            .script
            .as_ref()
            .ok_or_else(|| ConfigError::pipeline(pipeline, format!("{} has no script", label)))?;

        let commands = script
            .iter()
            .enumerate()
            .map(|(i, entry)| match entry {
                Value::String(command) => Ok(command.clone()),
                other => Err(ConfigError::pipeline(
                    pipeline,
                    format!(
                        "{} command {} is not a string: {}",
                        label,
                        i + 1,
                        serde_yaml::to_string(other).unwrap_or_default().trim()
                    ),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let timeout = match config.max_time {
            Some(value) => Some(minutes(value).ok_or_else(|| {
                ConfigError::pipeline(pipeline, format!("{} max-time {} is out of range", label, value))
            })?),
            None => defaults.timeout,
        };

        Ok(Step {
            name: config.name.clone(),
            image,
            commands,
            timeout,
        })
    }
}

//! Matrix generator - expands axes into concrete pipeline declarations
//!
//! A generator declares a pipeline template once and a set of ordered axes.
//! Every combination of axis values yields one pipeline, with `{{ axis }}`
//! (scalar values) or `{{ axis.key }}` (mapping values) placeholders
//! substituted into the name, step names, images and commands.

use crate::core::config::{StepConfig, StepEntry};
use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::sync::OnceLock;

/// A `generate:` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Group the generated pipelines are added to
    pub group: String,

    /// Pipeline name template
    pub name: String,

    /// Ordered axes; the first axis varies slowest
    pub axes: Mapping,

    /// Step templates
    pub steps: Vec<StepEntry>,
}

/// One concrete pipeline produced by a generator
#[derive(Debug, Clone)]
pub struct GeneratedPipeline {
    pub group: String,
    pub name: String,
    pub steps: Vec<StepConfig>,
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Substitute `{{ key }}` placeholders, failing on the first unknown key
pub fn render(template: &str, vars: &HashMap<String, String>) -> Result<String, String> {
    if let Some(missing) = placeholder()
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .find(|key| !vars.contains_key(key))
    {
        return Err(format!("unresolved placeholder '{{{{ {} }}}}' in \"{}\"", missing, template));
    }

    Ok(placeholder()
        .replace_all(template, |caps: &regex::Captures<'_>| vars[&caps[1]].clone())
        .into_owned())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl GeneratorConfig {
    fn error(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::Generator {
            generator: self.name.clone(),
            reason: reason.into(),
        }
    }

    /// Variable bindings for one axis value
    fn bindings(&self, axis: &str, value: &Value) -> Result<Vec<(String, String)>, ConfigError> {
        if let Some(scalar) = scalar_to_string(value) {
            return Ok(vec![(axis.to_string(), scalar)]);
        }

        let Value::Mapping(fields) = value else {
            return Err(self.error(format!(
                "axis '{}' values must be scalars or mappings of scalars",
                axis
            )));
        };

        fields
            .iter()
            .map(|(key, field)| {
                let key = key
                    .as_str()
                    .ok_or_else(|| self.error(format!("axis '{}' has a non-string key", axis)))?;
                let field = scalar_to_string(field).ok_or_else(|| {
                    self.error(format!("axis '{}' field '{}' is not a scalar", axis, key))
                })?;
                Ok((format!("{}.{}", axis, key), field))
            })
            .collect()
    }

    /// Every combination of axis values, first axis outermost
    pub fn combinations(&self) -> Result<Vec<HashMap<String, String>>, ConfigError> {
        if self.axes.is_empty() {
            return Err(self.error("declares no axes"));
        }

        let mut combos = vec![HashMap::new()];

        for (axis, values) in &self.axes {
            let axis = axis
                .as_str()
                .ok_or_else(|| self.error("axis names must be strings"))?;
            let Value::Sequence(values) = values else {
                return Err(self.error(format!("axis '{}' must be a list", axis)));
            };
            if values.is_empty() {
                return Err(self.error(format!("axis '{}' is empty", axis)));
            }

            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in values {
                    let mut extended: HashMap<String, String> = combo.clone();
                    extended.extend(self.bindings(axis, value)?);
                    next.push(extended);
                }
            }
            combos = next;
        }

        Ok(combos)
    }

    /// Expand into concrete pipeline declarations
    pub fn expand(&self) -> Result<Vec<GeneratedPipeline>, ConfigError> {
        if self.group.trim().is_empty() {
            return Err(self.error("group is empty"));
        }

        self.combinations()?
            .iter()
            .map(|vars| {
                let name = render(&self.name, vars).map_err(|e| self.error(e))?;
                if name.trim().is_empty() {
                    return Err(self.error("rendered pipeline name is empty"));
                }
                let steps = self
                    .steps
                    .iter()
                    .map(|entry| render_step(&entry.step, vars))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| self.error(format!("pipeline '{}': {}", name, e)))?;
                Ok(GeneratedPipeline {
                    group: self.group.clone(),
                    name,
                    steps,
                })
            })
            .collect()
    }
}

fn render_step(step: &StepConfig, vars: &HashMap<String, String>) -> Result<StepConfig, String> {
    let render_opt = |value: &Option<String>| -> Result<Option<String>, String> {
        value.as_deref().map(|v| render(v, vars)).transpose()
    };

    let script = step
        .script
        .as_ref()
        .map(|entries| {
            entries
                .iter()
                .map(|entry| match entry {
                    Value::String(command) => render(command, vars).map(Value::String),
                    // left for structural validation to reject
                    other => Ok(other.clone()),
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    Ok(StepConfig {
        name: render_opt(&step.name)?,
        image: render_opt(&step.image)?,
        script,
        max_time: step.max_time,
    })
}

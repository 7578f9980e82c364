//! Pipeline matrix domain model

use crate::error::ConfigError;
use std::collections::HashSet;
use std::time::Duration;

/// A single step: an environment reference and the commands run inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Optional display name
    pub name: Option<String>,

    /// Environment reference (image name) to provision for this step
    pub image: String,

    /// Shell commands, in execution order
    pub commands: Vec<String>,

    /// Per-command timeout, if one was declared for this step or the document
    pub timeout: Option<Duration>,
}

impl Step {
    /// Name used in events and reports
    pub fn display_name(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("step {}", index + 1),
        }
    }
}

/// A named, ordered sequence of steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    /// Pipeline name, unique within the matrix
    pub name: String,

    /// Group the pipeline was declared in
    pub group: String,

    /// Steps in declared order
    pub steps: Vec<Step>,
}

impl Pipeline {
    /// Total number of declared commands across all steps
    pub fn command_count(&self) -> usize {
        self.steps.iter().map(|s| s.commands.len()).sum()
    }

    /// `group/name`, used for display
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.group, self.name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::group(&self.group, "pipeline name is empty"));
        }
        if self.steps.is_empty() {
            return Err(ConfigError::pipeline(&self.name, "declares no steps"));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if step.image.trim().is_empty() {
                return Err(ConfigError::pipeline(
                    &self.name,
                    format!("{} has an empty image", step.display_name(index)),
                ));
            }
            if step.commands.is_empty() {
                return Err(ConfigError::pipeline(
                    &self.name,
                    format!("{} has an empty script", step.display_name(index)),
                ));
            }
            if step.commands.iter().any(|c| c.trim().is_empty()) {
                return Err(ConfigError::pipeline(
                    &self.name,
                    format!("{} has an empty command", step.display_name(index)),
                ));
            }
        }
        Ok(())
    }
}

/// Pipelines declared under one group name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineGroup {
    pub name: String,
    pub pipelines: Vec<Pipeline>,
}

/// The full declared set of pipelines, in declaration order
///
/// Read-only once built: every constructor validates the structural
/// invariants (non-empty steps and scripts, unique pipeline names).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineMatrix {
    groups: Vec<PipelineGroup>,
}

impl PipelineMatrix {
    /// Build a matrix from groups, validating it
    pub fn new(groups: Vec<PipelineGroup>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut total = 0;

        for group in &groups {
            if group.name.trim().is_empty() {
                return Err(ConfigError::group("", "group name is empty"));
            }
            if group.pipelines.is_empty() {
                return Err(ConfigError::group(&group.name, "declares no pipelines"));
            }
            for pipeline in &group.pipelines {
                pipeline.validate()?;
                if !seen.insert(pipeline.name.as_str()) {
                    return Err(ConfigError::DuplicatePipeline(pipeline.name.clone()));
                }
                total += 1;
            }
        }

        if total == 0 {
            return Err(ConfigError::Empty);
        }

        Ok(Self { groups })
    }

    /// Groups in declaration order
    pub fn groups(&self) -> &[PipelineGroup] {
        &self.groups
    }

    /// All pipelines, group by group, in declaration order
    pub fn pipelines(&self) -> impl Iterator<Item = &Pipeline> {
        self.groups.iter().flat_map(|g| g.pipelines.iter())
    }

    /// Look up a pipeline by name
    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines().find(|p| p.name == name)
    }

    /// Number of pipelines in the matrix
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.pipelines.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Restrict the matrix to the named pipelines and groups
    ///
    /// Empty filters select everything. A pipeline is kept when its name is
    /// listed or its group is listed. Names that match nothing are errors.
    pub fn select(&self, pipelines: &[String], groups: &[String]) -> Result<Self, ConfigError> {
        if pipelines.is_empty() && groups.is_empty() {
            return Ok(self.clone());
        }

        for name in pipelines {
            if self.pipeline(name).is_none() {
                return Err(ConfigError::UnknownPipeline(name.clone()));
            }
        }
        for name in groups {
            if !self.groups.iter().any(|g| &g.name == name) {
                return Err(ConfigError::UnknownGroup(name.clone()));
            }
        }

        let selected = self
            .groups
            .iter()
            .map(|group| PipelineGroup {
                name: group.name.clone(),
                pipelines: group
                    .pipelines
                    .iter()
                    .filter(|p| groups.contains(&group.name) || pipelines.contains(&p.name))
                    .cloned()
                    .collect(),
            })
            .filter(|g| !g.pipelines.is_empty())
            .collect();

        Self::new(selected)
    }
}

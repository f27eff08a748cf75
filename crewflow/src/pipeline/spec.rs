//! Stage specifications.

use super::PromptTemplate;
use crate::core::OutputFormat;
use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::service::GenerationHint;

/// Specification for a single stage in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    /// The unique id of the stage.
    pub id: String,
    /// The prompt template.
    pub template: PromptTemplate,
    /// Ids of earlier stages whose output this stage consumes, in order.
    pub dependencies: Vec<String>,
    /// Description of the expected output.
    pub expected_output: String,
    /// The worker assigned to the stage.
    pub worker: String,
    /// Optional file name for the artifact, when this is the last stage.
    pub output_file: Option<String>,
    /// Requested output format.
    pub format: OutputFormat,
}

impl StageSpec {
    /// Creates a new stage specification.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        worker: impl Into<String>,
        template: impl Into<PromptTemplate>,
    ) -> Self {
        Self {
            id: id.into(),
            template: template.into(),
            dependencies: Vec::new(),
            expected_output: String::new(),
            worker: worker.into(),
            output_file: None,
            format: OutputFormat::Text,
        }
    }

    /// Adds a dependency.
    #[must_use]
    pub fn depends_on(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the expected output description.
    #[must_use]
    pub fn expected_output(mut self, description: impl Into<String>) -> Self {
        self.expected_output = description.into();
        self
    }

    /// Sets the output file hint.
    #[must_use]
    pub fn output_file(mut self, name: impl Into<String>) -> Self {
        self.output_file = Some(name.into());
        self
    }

    /// Requests JSON output.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.format = OutputFormat::Json;
        self
    }

    /// The hint passed to the generative service.
    #[must_use]
    pub fn hint(&self) -> GenerationHint {
        GenerationHint {
            expected_output: self.expected_output.clone(),
            format: self.format,
        }
    }

    /// Validates the stage in isolation.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is blank, or the stage depends on itself
    /// or lists a dependency twice.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.id.trim().is_empty() {
            return Err(PipelineValidationError::new("Stage id cannot be empty").with_code(
                "CONFIG-STAGE_ID",
                "Blank stage id",
                "Give every stage a non-empty id.",
            ));
        }

        if self.dependencies.contains(&self.id) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' cannot depend on itself",
                self.id
            ))
            .with_stages(vec![self.id.clone()])
            .with_code(
                "CONFIG-SELF_REF",
                "Self dependency",
                "Remove the stage from its own dependency list.",
            ));
        }

        for (i, dep) in self.dependencies.iter().enumerate() {
            if self.dependencies[..i].contains(dep) {
                return Err(PipelineValidationError::new(format!(
                    "Stage '{}' lists dependency '{dep}' more than once",
                    self.id
                ))
                .with_stages(vec![self.id.clone(), dep.clone()])
                .with_error_info(
                    ContractErrorInfo::new("CONFIG-DUPLICATE_DEP", "Duplicate dependency")
                        .with_fix_hint("List each dependency once.")
                        .with_context_entry("dependency", dep),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let spec = StageSpec::new("plan", "planner", "Plan {criteria}")
            .depends_on("criteria")
            .expected_output("tasks")
            .output_file("plan.json")
            .json();

        assert_eq!(spec.dependencies, vec!["criteria"]);
        assert_eq!(spec.output_file.as_deref(), Some("plan.json"));
        assert!(spec.hint().wants_json());
        assert_eq!(spec.hint().expected_output, "tasks");
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_self_dependency_rejected() {
        let err = StageSpec::new("a", "w", "x").depends_on("a").validate().unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-SELF_REF"));
        assert_eq!(err.stages, vec!["a"]);
    }

    #[test]
    fn test_duplicate_dependency_rejected() {
        let err = StageSpec::new("c", "w", "x")
            .with_dependencies(["a", "b", "a"])
            .validate()
            .unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-DUPLICATE_DEP"));
    }

    #[test]
    fn test_blank_id_rejected() {
        let err = StageSpec::new("", "w", "x").validate().unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-STAGE_ID"));
    }
}

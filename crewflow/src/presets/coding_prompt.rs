//! Requirement → prompt for a coding model.

use super::requirement_placeholder;
use crate::clarification::REQUIREMENT_INPUT;
use crate::errors::PipelineValidationError;
use crate::pipeline::{Pipeline, PipelineBuilder, StageSpec};
use crate::service::GenerativeService;
use crate::workers::Worker;
use std::sync::Arc;

/// Builds the five-stage prompt crew.
///
/// # Errors
///
/// Returns an error only if the definition is invalid.
pub fn coding_prompt_pipeline(
    service: Arc<dyn GenerativeService>,
) -> Result<Pipeline, PipelineValidationError> {
    let analyst = Worker::new("requirement_analyst", "Requirement Engineer", service.clone())
        .with_goal(
            "Extract role, function and benefit from user stories; identify ambiguities \
             and missing information.",
        )
        .with_backstory("Has a keen eye for missing requirements and gaps in specifications.");

    let enricher = Worker::new("context_enricher", "Software Architect", service.clone())
        .with_goal("Add the technical and business context that the project documentation implies.")
        .with_backstory("Knows the project inside out and fills in relevant context.");

    let architect = Worker::new("solution_architect", "Full-Stack Developer", service.clone())
        .with_goal("Design a technical solution with API endpoints, data models and libraries.")
        .with_backstory("Years of experience turning requirements into robust architectures.");

    let qa = Worker::new("qa_engineer", "Test Engineer", service.clone())
        .with_goal("Write testable Given-When-Then acceptance criteria covering success and failure.")
        .with_backstory("Specialised in QA and test automation; keeps requirements testable and precise.");

    let synthesizer = Worker::new("prompt_synthesizer", "Prompt Engineer", service)
        .with_goal("Merge everything gathered into one clear, effective markdown prompt.")
        .with_backstory("Experienced in tuning prompts so coding models produce their best work.");

    PipelineBuilder::new("coding-prompt")
        .input(REQUIREMENT_INPUT)
        .worker(analyst)
        .worker(enricher)
        .worker(architect)
        .worker(qa)
        .worker(synthesizer)
        .stage(
            StageSpec::new(
                "analysis",
                "requirement_analyst",
                format!(
                    "Analyse the following user story. Extract the role, the requested function \
                     and the benefit. Identify obvious ambiguities and missing information needed \
                     for implementation:\n\n{}",
                    requirement_placeholder()
                ),
            )
            .expected_output("A structured list with role, function, benefit and open questions."),
        )?
        .stage(
            StageSpec::new(
                "context",
                "context_enricher",
                "Extend the analysed user story with relevant technical and business context.",
            )
            .depends_on("analysis")
            .expected_output(
                "An extended requirement with context such as tech stack, existing architecture \
                 and conventions.",
            ),
        )?
        .stage(
            StageSpec::new(
                "architecture",
                "solution_architect",
                "Based on the requirement and its context, design a technical solution with API \
                 endpoints, data models and the libraries to use.",
            )
            .depends_on("context")
            .expected_output("A technical specification with clear endpoints, data models and technologies."),
        )?
        .stage(
            StageSpec::new(
                "acceptance",
                "qa_engineer",
                "From the technical specification, write testable acceptance criteria in BDD \
                 style (Given-When-Then). Cover success and failure cases.",
            )
            .depends_on("architecture")
            .expected_output("A list of acceptance criteria in Given-When-Then format."),
        )?
        .stage(
            StageSpec::new(
                "prompt",
                "prompt_synthesizer",
                "Format the user story, context, technical specification and acceptance \
                 criteria into a single markdown prompt for a coding model. Do NOT generate \
                 code; the prompt is the input for a model that writes the code later. End \
                 with a clear instruction such as: 'Please generate the complete code based on \
                 this information.'",
            )
            .with_dependencies(["analysis", "context", "architecture", "acceptance"])
            .expected_output("A well-structured markdown prompt without example code or classes, text only."),
        )?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedService;

    #[test]
    fn test_chain_layout() {
        let pipeline = coding_prompt_pipeline(Arc::new(ScriptedService::new())).unwrap();

        assert_eq!(
            pipeline.stage_ids(),
            vec!["analysis", "context", "architecture", "acceptance", "prompt"]
        );
        assert!(pipeline.manager().is_none());
        assert_eq!(pipeline.stages()[1].dependencies, vec!["analysis"]);
    }
}

//! Requirement → code, and code → review.

use super::requirement_placeholder;
use crate::clarification::REQUIREMENT_INPUT;
use crate::errors::PipelineValidationError;
use crate::pipeline::{Pipeline, PipelineBuilder, StageSpec};
use crate::service::GenerativeService;
use crate::workers::Worker;
use std::sync::Arc;

/// Review verdict the reviewer gives when nothing needs to change.
pub const READY_VERDICT: &str = "Code is ready for implementation.";

/// Builds the two-stage code crew: `requirements → code`.
///
/// # Errors
///
/// Returns an error only if the definition is invalid.
pub fn code_pipeline(service: Arc<dyn GenerativeService>) -> Result<Pipeline, PipelineValidationError> {
    let analyst = Worker::new("extractor", "Business Analyst", service.clone())
        .with_goal("Analyse the user story and extract the key functional requirements as a short, clear list.")
        .with_backstory("Long experience in requirements analysis; filters the essentials out of complex stories.");

    let developer = Worker::new("developer", "Software Developer", service)
        .with_goal("Write clean code from the extracted requirements.")
        .with_backstory("Experienced programmer who turns requirements into running code quickly.");

    PipelineBuilder::new("code")
        .input(REQUIREMENT_INPUT)
        .worker(analyst)
        .worker(developer)
        .stage(
            StageSpec::new(
                "requirements",
                "extractor",
                format!(
                    "Extract the key functional requirements from the following user story and \
                     summarise them as a short, numbered list:\n\n{}",
                    requirement_placeholder()
                ),
            )
            .expected_output("A short, numbered list of the key requirements, one sentence each."),
        )?
        .stage(
            StageSpec::new(
                "code",
                "developer",
                "Based on the extracted requirements, write clean, commented code that \
                 implements the functionality.",
            )
            .depends_on("requirements")
            .expected_output("Runnable, commented code that implements the requirements."),
        )?
        .build()
}

/// Builds the two-stage review crew: `code → review`, the reviewer reading
/// the generated code in place.
///
/// # Errors
///
/// Returns an error only if the definition is invalid.
pub fn code_review_pipeline(
    service: Arc<dyn GenerativeService>,
) -> Result<Pipeline, PipelineValidationError> {
    let developer = Worker::new("developer", "Software Engineer", service.clone())
        .with_goal("Generate functional and syntactically correct Python code from user stories.")
        .with_backstory("Expert Python developer known for clean, efficient and robust code.");

    let reviewer = Worker::new("reviewer", "Senior Code Reviewer", service)
        .with_goal("Review generated Python code for functionality, best practices and potential errors.")
        .with_backstory("Meticulous, experienced reviewer with an eye for detail.");

    PipelineBuilder::new("code-review")
        .input(REQUIREMENT_INPUT)
        .worker(developer)
        .worker(reviewer)
        .stage(
            StageSpec::new(
                "code",
                "developer",
                format!(
                    "Write complete, working Python code for the following user story: {}. \
                     Return only the code, wrapped in ```python ... ```. Add no explanations \
                     outside the code block.",
                    requirement_placeholder()
                ),
            )
            .expected_output("A complete, runnable Python snippet wrapped in ```python ... ```."),
        )?
        .stage(
            StageSpec::new(
                "review",
                "reviewer",
                format!(
                    "Check the following code for syntax errors, logic errors, potential runtime \
                     problems and adherence to best practices. Give precise suggestions for every \
                     problem found. If the code is syntactically correct, looks functional and \
                     matches the user story, reply only with '{READY_VERDICT}'. Analyse this \
                     code:\n\n{{code}}"
                ),
            )
            .depends_on("code")
            .expected_output(format!(
                "A detailed report of code problems with suggested fixes, or the confirmation \
                 '{READY_VERDICT}' when everything is in order."
            )),
        )?
        .build()
}

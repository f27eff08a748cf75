//! Requirement → GitHub issue.

use super::requirement_placeholder;
use crate::clarification::REQUIREMENT_INPUT;
use crate::errors::PipelineValidationError;
use crate::pipeline::{Pipeline, PipelineBuilder, StageSpec};
use crate::service::GenerativeService;
use crate::workers::Worker;
use std::sync::Arc;

/// Builds the five-stage issue crew with a manager as delegation target.
///
/// `skeleton → story → tasks → review → issue`; the formatter sees every
/// earlier output.
///
/// # Errors
///
/// Returns an error only if the definition is invalid.
pub fn user_story_pipeline(
    service: Arc<dyn GenerativeService>,
) -> Result<Pipeline, PipelineValidationError> {
    let manager = Worker::new("manager", "Crew Manager", service.clone())
        .with_goal(
            "Coordinate the specialists and make sure the crew ends with a validated \
             GitHub issue in markdown.",
        )
        .with_backstory(
            "Experienced agile coach, at home in Scrum flows and AI orchestration. \
             Prioritises efficiency, quality and low risk.",
        )
        .with_max_iterations(3);

    let product_owner = Worker::new("product_owner", "Product Owner", service.clone())
        .with_goal("Turn raw requirements into a story skeleton with title, as_a, i_want and so_that.")
        .with_backstory("Keeps the business view and writes plainly, without jargon.")
        .with_max_iterations(2)
        .allow_delegation();

    let story_architect = Worker::new("story_architect", "Story Architect", service.clone())
        .with_goal(
            "Write the full user story with Gherkin acceptance criteria and a complete \
             definition of done.",
        )
        .with_backstory("Senior requirements engineer focused on clear, testable acceptance criteria.")
        .allow_delegation();

    let sprint_planner = Worker::new("sprint_planner", "Sprint Planner", service.clone())
        .with_goal("Split the story into sub-tasks, assign story points and write a ready-for-dev checklist.")
        .with_backstory("Seasoned in planning poker, estimation and task breakdown.")
        .allow_delegation();

    let qa_analyst = Worker::new("qa_analyst", "QA Analyst", service.clone())
        .with_goal("Check clarity, Gherkin syntax and ambiguity; give a score and feedback.")
        .with_backstory("Strict reviewer with a rubric catalogue and Gherkin lint experience.")
        .with_max_iterations(2)
        .allow_delegation();

    let issue_formatter = Worker::new("issue_formatter", "Issue Formatter", service)
        .with_goal("Render the validated content as a GitHub markdown issue, ready to paste.")
        .with_backstory("Markdown expert who knows GitHub flavour and user story conventions.");

    PipelineBuilder::new("user-story")
        .input(REQUIREMENT_INPUT)
        .manager(manager)
        .worker(product_owner)
        .worker(story_architect)
        .worker(sprint_planner)
        .worker(qa_analyst)
        .worker(issue_formatter)
        .stage(
            StageSpec::new(
                "skeleton",
                "product_owner",
                format!(
                    "Analyse the following user story requirement and extract its core parts. \
                     Format the result only as a JSON object with the keys 'title', 'as_a', \
                     'i_want' and 'so_that'.\n\nRequirement:\n---\n{}\n---",
                    requirement_placeholder()
                ),
            )
            .expected_output(
                r#"A single JSON object describing the story. Example: {"title": "...", "as_a": "...", "i_want": "...", "so_that": "..."}"#,
            )
            .json(),
        )?
        .stage(
            StageSpec::new(
                "story",
                "story_architect",
                "Expand the story skeleton below with detailed acceptance criteria in Gherkin \
                 format (Given/When/Then) and a matching definition of done. Return a JSON \
                 object with the keys 'story_markdown', 'acceptance_criteria' and \
                 'definition_of_done'.\n\nStory skeleton:\n{skeleton}",
            )
            .depends_on("skeleton")
            .expected_output("A JSON object with the formatted story, Gherkin criteria and the definition of done.")
            .json(),
        )?
        .stage(
            StageSpec::new(
                "tasks",
                "sprint_planner",
                "Based on the user story and its acceptance criteria, list the technical \
                 sub-tasks. Estimate each in story points (1, 2, 3, 5, ...). Add a 'ready for \
                 dev' checklist. Return a JSON object with the keys 'tasks' (a list of objects \
                 with 'desc' and 'points') and 'checklist' (a list of strings).",
            )
            .depends_on("story")
            .expected_output("A JSON object with sub-tasks including story points, and a checklist.")
            .json(),
        )?
        .stage(
            StageSpec::new(
                "review",
                "qa_analyst",
                "Review the user story, acceptance criteria and sub-tasks for clarity, \
                 completeness and contradictions. Score the quality from 0 to 100. List every \
                 finding and state whether it blocks development. Return a JSON object with \
                 the keys 'score', 'findings' and 'blocking'.",
            )
            .with_dependencies(["story", "tasks"])
            .expected_output("A JSON object with a quality score, a list of findings and a blocking flag.")
            .json(),
        )?
        .stage(
            StageSpec::new(
                "issue",
                "issue_formatter",
                "Combine everything above (user story, acceptance criteria, sub-tasks, \
                 definition of done) into one GitHub issue in markdown. Follow GitHub \
                 formatting conventions exactly and keep it easy to scan. End with suggested \
                 labels.",
            )
            .with_dependencies(["skeleton", "story", "tasks", "review"])
            .expected_output("A single, cleanly formatted markdown block containing the whole GitHub issue."),
        )?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedService;

    #[test]
    fn test_dependency_layout() {
        let pipeline = user_story_pipeline(Arc::new(ScriptedService::new())).unwrap();

        assert_eq!(
            pipeline.stage_ids(),
            vec!["skeleton", "story", "tasks", "review", "issue"]
        );
        let issue = pipeline.final_stage().unwrap();
        assert_eq!(issue.dependencies, vec!["skeleton", "story", "tasks", "review"]);
        assert_eq!(pipeline.manager().map(|m| m.id()), Some("manager"));
        assert_eq!(pipeline.worker("qa_analyst").unwrap().max_iterations(), 2);
    }
}

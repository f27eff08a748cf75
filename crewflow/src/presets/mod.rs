//! Ready-made crews.
//!
//! Role text is configuration; the pipelines themselves are ordinary
//! [`PipelineBuilder`](crate::pipeline::PipelineBuilder) output.

mod code;
mod coding_prompt;
mod user_story;

pub use code::{code_pipeline, code_review_pipeline, READY_VERDICT};
pub use coding_prompt::coding_prompt_pipeline;
pub use user_story::user_story_pipeline;

use crate::clarification::REQUIREMENT_INPUT;
use crate::errors::PipelineValidationError;
use crate::pipeline::Pipeline;
use crate::service::GenerativeService;
use crate::workers::Worker;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The available crews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum PresetKind {
    /// Requirement → GitHub issue in markdown.
    #[default]
    UserStory,
    /// Requirement → prompt for a coding model.
    CodingPrompt,
    /// Requirement → extracted requirements → code.
    Code,
    /// Requirement → Python code → review report.
    CodeReview,
}

impl fmt::Display for PresetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserStory => write!(f, "user-story"),
            Self::CodingPrompt => write!(f, "coding-prompt"),
            Self::Code => write!(f, "code"),
            Self::CodeReview => write!(f, "code-review"),
        }
    }
}

/// A crew's pipeline plus how its artifact is named.
#[derive(Debug, Clone)]
pub struct Preset {
    /// Which crew this is.
    pub kind: PresetKind,
    /// The validated pipeline.
    pub pipeline: Pipeline,
    /// Prefix for generated artifact names.
    pub artifact_prefix: &'static str,
    /// Extension used when sniffing is off or finds nothing.
    pub fallback_extension: &'static str,
    /// Whether the artifact extension follows the code it contains.
    pub sniff_code: bool,
}

impl Preset {
    /// Builds the preset's pipeline over `service`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the preset definition itself is invalid.
    pub fn build(
        kind: PresetKind,
        service: Arc<dyn GenerativeService>,
    ) -> Result<Self, PipelineValidationError> {
        let preset = match kind {
            PresetKind::UserStory => Self {
                kind,
                pipeline: user_story_pipeline(service)?,
                artifact_prefix: "issue",
                fallback_extension: "md",
                sniff_code: false,
            },
            PresetKind::CodingPrompt => Self {
                kind,
                pipeline: coding_prompt_pipeline(service)?,
                artifact_prefix: "prompt_output",
                fallback_extension: "txt",
                sniff_code: false,
            },
            PresetKind::Code => Self {
                kind,
                pipeline: code_pipeline(service)?,
                artifact_prefix: "output",
                fallback_extension: "txt",
                sniff_code: true,
            },
            PresetKind::CodeReview => Self {
                kind,
                pipeline: code_review_pipeline(service)?,
                artifact_prefix: "review",
                fallback_extension: "md",
                sniff_code: false,
            },
        };
        Ok(preset)
    }
}

/// The worker that proposes clarification questions.
#[must_use]
pub fn clarifier(service: Arc<dyn GenerativeService>) -> Worker {
    Worker::new("clarifier", "Requirements Clarifier", service)
        .with_goal("Find the gaps in a requirement that would block implementation and ask about them.")
        .with_backstory(
            "Business analyst who has seen many projects stall on unasked questions; \
             asks few questions, each one specific.",
        )
        .with_max_iterations(2)
}

fn requirement_placeholder() -> String {
    format!("{{{REQUIREMENT_INPUT}}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedService;

    #[test]
    fn test_presets_build() {
        let service: Arc<dyn GenerativeService> = Arc::new(ScriptedService::new());
        for (kind, stages) in [
            (PresetKind::UserStory, 5),
            (PresetKind::CodingPrompt, 5),
            (PresetKind::Code, 2),
            (PresetKind::CodeReview, 2),
        ] {
            let preset = Preset::build(kind, service.clone()).unwrap();
            assert_eq!(preset.pipeline.stages().len(), stages, "{kind}");
            assert_eq!(preset.pipeline.inputs(), [REQUIREMENT_INPUT]);
            assert_eq!(preset.pipeline.name(), kind.to_string());
        }
    }

    #[test]
    fn test_artifact_naming() {
        let service: Arc<dyn GenerativeService> = Arc::new(ScriptedService::new());
        let issue = Preset::build(PresetKind::UserStory, service.clone()).unwrap();
        let prompt = Preset::build(PresetKind::CodingPrompt, service).unwrap();

        assert_eq!((issue.artifact_prefix, issue.fallback_extension), ("issue", "md"));
        assert_eq!(prompt.artifact_prefix, "prompt_output");
        assert!(!issue.sniff_code && !prompt.sniff_code);
    }

    #[test]
    fn test_only_code_preset_sniffs() {
        let service: Arc<dyn GenerativeService> = Arc::new(ScriptedService::new());
        let code = Preset::build(PresetKind::Code, service.clone()).unwrap();
        let review = Preset::build(PresetKind::CodeReview, service).unwrap();

        assert!(code.sniff_code);
        assert_eq!((code.artifact_prefix, code.fallback_extension), ("output", "txt"));
        assert!(!review.sniff_code);
        assert_eq!((review.artifact_prefix, review.fallback_extension), ("review", "md"));
    }

    #[test]
    fn test_preset_kind_serde() {
        let kind: PresetKind = serde_json::from_str("\"coding-prompt\"").unwrap();
        assert_eq!(kind, PresetKind::CodingPrompt);
        let kind: PresetKind = serde_json::from_str("\"code-review\"").unwrap();
        assert_eq!(kind, PresetKind::CodeReview);
        assert_eq!(PresetKind::default().to_string(), "user-story");
    }

    #[test]
    fn test_clarifier_is_valid() {
        let service: Arc<dyn GenerativeService> = Arc::new(ScriptedService::new());
        assert!(clarifier(service).validate().is_ok());
    }
}

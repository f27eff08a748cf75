//! The top-level invocation: clarify, run with retry, persist.

use crate::clarification::{ClarificationRound, Operator, REQUIREMENT_INPUT};
use crate::config::CrewConfig;
use crate::core::{InputBindings, PipelineRun};
use crate::errors::{CrewflowError, PipelineValidationError};
use crate::events::{EventSink, NoOpEventSink};
use crate::pipeline::{execute_with_retry, Pipeline, RetryConfig};
use crate::presets::{clarifier, Preset};
use crate::service::GenerativeService;
use crate::sink::{ArtifactSink, NameHint};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Ties clarification, the pipeline, whole-run retry and the artifact sink
/// together.
///
/// # Example
///
/// ```rust,ignore
/// let crew = Crew::new(pipeline, Arc::new(FileArtifactSink::new("output")))
///     .with_clarification(round, Arc::new(StdinOperator::stdin()))
///     .with_retry(RetryConfig::new().with_max_attempts(3));
/// let issue = crew.kickoff("As a user, I want to export reports").await?;
/// ```
pub struct Crew {
    pipeline: Pipeline,
    clarification: Option<(ClarificationRound, Arc<dyn Operator>)>,
    retry: RetryConfig,
    sink: Arc<dyn ArtifactSink>,
    event_sink: Arc<dyn EventSink>,
    artifact_prefix: String,
    fallback_extension: String,
    sniff_code: bool,
}

impl Crew {
    /// Creates a crew without clarification and with the default retry policy.
    #[must_use]
    pub fn new(pipeline: Pipeline, sink: Arc<dyn ArtifactSink>) -> Self {
        Self {
            pipeline,
            clarification: None,
            retry: RetryConfig::default(),
            sink,
            event_sink: Arc::new(NoOpEventSink),
            artifact_prefix: "output".to_string(),
            fallback_extension: "txt".to_string(),
            sniff_code: false,
        }
    }

    /// Builds the configured preset crew over `service`.
    ///
    /// # Errors
    ///
    /// Returns an error if the preset or the clarifier is invalid.
    pub fn from_config(
        config: &CrewConfig,
        service: Arc<dyn GenerativeService>,
        sink: Arc<dyn ArtifactSink>,
        operator: Arc<dyn Operator>,
    ) -> Result<Self, PipelineValidationError> {
        let preset = Preset::build(config.preset, service.clone())?;
        let round = ClarificationRound::new(clarifier(service), config.max_clarification_questions)
            .with_retry(config.retry_config())
            .with_operator_timeout(config.operator_timeout());
        round.pipeline()?;

        Ok(Self::new(preset.pipeline, sink)
            .with_artifact_naming(preset.artifact_prefix, preset.fallback_extension)
            .with_code_sniffing(preset.sniff_code)
            .with_clarification(round, operator)
            .with_retry(config.retry_config()))
    }

    /// Enables the clarification round before each kickoff.
    #[must_use]
    pub fn with_clarification(mut self, round: ClarificationRound, operator: Arc<dyn Operator>) -> Self {
        let round = round.with_event_sink(self.event_sink.clone());
        self.clarification = Some((round, operator));
        self
    }

    /// Disables clarification.
    #[must_use]
    pub fn without_clarification(mut self) -> Self {
        self.clarification = None;
        self
    }

    /// Sets the whole-run retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the event sink for the crew, its pipeline and its clarification round.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.pipeline = self.pipeline.with_event_sink(sink.clone());
        self.clarification = self
            .clarification
            .map(|(round, operator)| (round.with_event_sink(sink.clone()), operator));
        self.event_sink = sink;
        self
    }

    /// Sets how generated artifact names look.
    #[must_use]
    pub fn with_artifact_naming(
        mut self,
        prefix: impl Into<String>,
        fallback_extension: impl Into<String>,
    ) -> Self {
        self.artifact_prefix = prefix.into();
        self.fallback_extension = fallback_extension.into();
        self
    }

    /// Lets the artifact extension follow the code it contains.
    #[must_use]
    pub fn with_code_sniffing(mut self, enabled: bool) -> Self {
        self.sniff_code = enabled;
        self
    }

    /// Returns the pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Turns `requirement` into the final artifact.
    ///
    /// Clarification runs once. The pipeline is retried from its first
    /// stage on retryable failures, and the artifact is persisted exactly
    /// once, after the successful run. A sink failure is logged and the
    /// artifact is still returned.
    ///
    /// # Errors
    ///
    /// Configuration and operator errors, fatal service failures, and
    /// [`CrewflowError::RetriesExhausted`] once the attempt budget is spent.
    pub async fn kickoff(&self, requirement: &str) -> Result<String, CrewflowError> {
        let input = match &self.clarification {
            Some((round, operator)) => round.run(requirement, operator.as_ref()).await?.enriched(),
            None => requirement.to_string(),
        };
        let inputs = InputBindings::from([(REQUIREMENT_INPUT.to_string(), input)]);
        let (pipeline, inputs) = (&self.pipeline, &inputs);

        let artifact = execute_with_retry(&self.retry, "pipeline", self.event_sink.as_ref(), move || async move {
            let run = pipeline.run(inputs).await?;
            take_artifact(pipeline, run)
        })
        .await?;

        info!(pipeline = %self.pipeline.name(), bytes = artifact.len(), "Artifact produced");
        self.persist(requirement, &artifact).await;
        Ok(artifact)
    }

    async fn persist(&self, requirement: &str, artifact: &str) {
        let hint = NameHint::new(requirement)
            .with_file_name(self.pipeline.final_stage().and_then(|s| s.output_file.clone()))
            .with_prefix(self.artifact_prefix.clone())
            .with_fallback_extension(self.fallback_extension.clone())
            .with_code_sniffing(self.sniff_code);

        match self.sink.persist(&hint, artifact).await {
            Ok(location) => {
                info!(%location, "Artifact persisted");
                self.event_sink
                    .emit(
                        "artifact.persisted",
                        Some(json!({"pipeline": self.pipeline.name(), "location": location})),
                    )
                    .await;
            }
            Err(e) => {
                warn!(error = %e, "Artifact could not be persisted");
                self.event_sink
                    .emit(
                        "artifact.persist_failed",
                        Some(json!({"pipeline": self.pipeline.name(), "error": e.to_string()})),
                    )
                    .await;
            }
        }
    }
}

/// The run's artifact, or `MissingArtifact` naming why the last stage failed.
fn take_artifact(pipeline: &Pipeline, run: PipelineRun) -> Result<String, CrewflowError> {
    let stage = pipeline.final_stage().map(|s| s.id.clone()).unwrap_or_default();
    let reason = run
        .result(&stage)
        .and_then(|r| r.error.clone())
        .unwrap_or_else(|| "stage did not run".to_string());
    run.into_artifact()
        .ok_or(CrewflowError::MissingArtifact { stage, reason })
}

impl std::fmt::Debug for Crew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crew")
            .field("pipeline", &self.pipeline.name())
            .field("clarification", &self.clarification.as_ref().map(|(r, _)| r))
            .field("retry", &self.retry)
            .field("artifact_prefix", &self.artifact_prefix)
            .field("sniff_code", &self.sniff_code)
            .finish_non_exhaustive()
    }
}

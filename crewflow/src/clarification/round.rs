//! The clarification round: propose questions, collect answers, merge.

use super::{parse_questions, ClarificationSession, Operator};
use crate::core::InputBindings;
use crate::errors::{CrewflowError, PipelineValidationError};
use crate::events::{EventSink, NoOpEventSink};
use crate::pipeline::{execute_with_retry, Pipeline, PipelineBuilder, RetryConfig, StageSpec};
use crate::workers::Worker;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Input name bound to the raw requirement.
pub const REQUIREMENT_INPUT: &str = "requirement";

const QUESTIONS_STAGE: &str = "questions";

/// A one-stage sub-pipeline that asks a clarifier worker for up to `K`
/// questions and has the operator answer them.
#[derive(Clone)]
pub struct ClarificationRound {
    clarifier: Worker,
    max_questions: usize,
    retry: RetryConfig,
    operator_timeout: Option<Duration>,
    event_sink: Arc<dyn EventSink>,
}

impl ClarificationRound {
    /// Creates a round with the default retry policy and no answer timeout.
    #[must_use]
    pub fn new(clarifier: Worker, max_questions: usize) -> Self {
        Self {
            clarifier,
            max_questions,
            retry: RetryConfig::default(),
            operator_timeout: None,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the retry policy for question proposal.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Bounds each operator wait. A timed-out wait counts as an empty answer.
    #[must_use]
    pub fn with_operator_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operator_timeout = timeout;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the question budget.
    #[must_use]
    pub fn max_questions(&self) -> usize {
        self.max_questions
    }

    /// The one-stage proposal pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the clarifier worker is invalid.
    pub fn pipeline(&self) -> Result<Pipeline, PipelineValidationError> {
        let template = format!(
            "Read the requirement below and list the questions whose answers would most \
             improve it. Ask at most {} question(s). If the requirement is already clear, \
             return an empty list.\n\nRequirement:\n{{{REQUIREMENT_INPUT}}}",
            self.max_questions
        );
        PipelineBuilder::new("clarification")
            .input(REQUIREMENT_INPUT)
            .worker(self.clarifier.clone())
            .event_sink(self.event_sink.clone())
            .stage(
                StageSpec::new(QUESTIONS_STAGE, self.clarifier.id(), template)
                    .expected_output(r#"A JSON object: {"questions": ["..."]}"#)
                    .json(),
            )?
            .build()
    }

    /// Runs the round for `requirement`.
    ///
    /// With a budget of zero the round is skipped without any service call.
    /// If proposal keeps failing the round degrades to asking nothing.
    ///
    /// # Errors
    ///
    /// Returns configuration errors, and operator I/O failures.
    pub async fn run(
        &self,
        requirement: &str,
        operator: &dyn Operator,
    ) -> Result<ClarificationSession, CrewflowError> {
        let mut session = ClarificationSession::new(requirement);
        if self.max_questions == 0 {
            debug!("Clarification skipped, question budget is zero");
            return Ok(session);
        }

        let questions = self.propose(requirement).await?;
        session.propose(questions, self.max_questions);
        info!(count = session.questions().len(), "Clarification questions proposed");
        self.event_sink.try_emit(
            "clarification.proposed",
            Some(json!({"pipeline": "clarification", "questions": session.questions()})),
        );
        if session.questions().is_empty() {
            return Ok(session);
        }

        for question in session.questions().to_vec() {
            let answer = self.ask(operator, &question).await?;
            session.record_answer(question, answer);
        }

        self.event_sink.try_emit(
            "clarification.merged",
            Some(json!({"pipeline": "clarification", "answers": session.answers().len()})),
        );
        Ok(session)
    }

    async fn propose(&self, requirement: &str) -> Result<Vec<String>, CrewflowError> {
        let pipeline = self.pipeline()?;
        let inputs = InputBindings::from([(REQUIREMENT_INPUT.to_string(), requirement.to_string())]);
        let (pipeline, inputs) = (&pipeline, &inputs);

        let outcome =
            execute_with_retry(&self.retry, "clarification", self.event_sink.as_ref(), move || {
                pipeline.run(inputs)
            })
            .await;

        match outcome {
            Ok(run) => Ok(run.final_artifact().map(parse_questions).unwrap_or_default()),
            Err(e @ CrewflowError::Configuration(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, "Question proposal failed, continuing without clarification");
                Ok(Vec::new())
            }
        }
    }

    async fn ask(&self, operator: &dyn Operator, question: &str) -> Result<String, CrewflowError> {
        let answer = match self.operator_timeout {
            Some(limit) => match tokio::time::timeout(limit, operator.ask(question)).await {
                Ok(answer) => answer?,
                Err(_) => {
                    warn!(question, timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX), "Operator did not answer in time");
                    None
                }
            },
            None => operator.ask(question).await?,
        };
        Ok(answer.unwrap_or_default())
    }
}

impl std::fmt::Debug for ClarificationRound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClarificationRound")
            .field("clarifier", &self.clarifier.id())
            .field("max_questions", &self.max_questions)
            .field("retry", &self.retry)
            .field("operator_timeout", &self.operator_timeout)
            .finish_non_exhaustive()
    }
}

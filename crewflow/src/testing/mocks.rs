//! Scripted doubles for the service, operator and sink boundaries.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::clarification::Operator;
use crate::errors::{OperatorError, ServiceError, SinkError};
use crate::service::{GenerationHint, GenerativeService};
use crate::sink::{ArtifactSink, NameHint};

/// A generative service that replays scripted replies.
///
/// Rules (prompt substring → reply) are checked first, then the queue is
/// consumed in order. An empty queue falls back to the default reply, or
/// to a fatal error when none is set.
#[derive(Debug, Default)]
pub struct ScriptedService {
    rules: Vec<(String, String)>,
    queue: Mutex<VecDeque<Result<String, ServiceError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
    hints: Mutex<Vec<GenerationHint>>,
}

impl ScriptedService {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply.
    #[must_use]
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.queue.lock().push_back(Ok(text.into()));
        self
    }

    /// Queues a failure.
    #[must_use]
    pub fn fail(self, error: ServiceError) -> Self {
        self.queue.lock().push_back(Err(error));
        self
    }

    /// Queues `times` copies of a failure.
    #[must_use]
    pub fn fail_times(self, times: usize, error: &ServiceError) -> Self {
        for _ in 0..times {
            self.queue.lock().push_back(Err(error.clone()));
        }
        self
    }

    /// Replies with `text` whenever the prompt contains `needle`.
    #[must_use]
    pub fn when(mut self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        self.rules.push((needle.into(), text.into()));
        self
    }

    /// Sets the reply used once the queue is empty.
    #[must_use]
    pub fn otherwise(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    /// Returns the number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    /// Returns every prompt received, in order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Returns every hint received, in order.
    #[must_use]
    pub fn hints(&self) -> Vec<GenerationHint> {
        self.hints.lock().clone()
    }

    /// Returns the number of queued replies left.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.lock().len()
    }
}

#[async_trait]
impl GenerativeService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, hint: &GenerationHint) -> Result<String, ServiceError> {
        self.prompts.lock().push(prompt.to_string());
        self.hints.lock().push(hint.clone());

        if let Some((_, reply)) = self.rules.iter().find(|(needle, _)| prompt.contains(needle)) {
            return Ok(reply.clone());
        }
        if let Some(next) = self.queue.lock().pop_front() {
            return next;
        }
        self.fallback
            .clone()
            .ok_or_else(|| ServiceError::fatal("script exhausted"))
    }
}

/// An operator that replays scripted answers.
///
/// `None` entries and an exhausted script behave like end of input.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: Mutex<VecDeque<Option<String>>>,
    questions: Mutex<Vec<String>>,
}

impl ScriptedOperator {
    /// Creates an operator with the given answers.
    #[must_use]
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(|a| Some(a.into())).collect()),
            questions: Mutex::new(Vec::new()),
        }
    }

    /// Queues an end-of-input.
    #[must_use]
    pub fn then_eof(self) -> Self {
        self.answers.lock().push_back(None);
        self
    }

    /// Returns the questions asked, in order.
    #[must_use]
    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().clone()
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn ask(&self, question: &str) -> Result<Option<String>, OperatorError> {
        self.questions.lock().push(question.to_string());
        Ok(self.answers.lock().pop_front().flatten())
    }
}

/// A sink that keeps artifacts in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Mutex<Vec<(NameHint, String)>>,
    fail_with: Option<String>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that rejects every artifact.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            artifacts: Mutex::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    /// Returns the persisted artifacts.
    #[must_use]
    pub fn artifacts(&self) -> Vec<(NameHint, String)> {
        self.artifacts.lock().clone()
    }

    /// Returns the number of persist calls that succeeded.
    #[must_use]
    pub fn persist_count(&self) -> usize {
        self.artifacts.lock().len()
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn persist(&self, hint: &NameHint, content: &str) -> Result<String, SinkError> {
        if let Some(reason) = &self.fail_with {
            return Err(SinkError::Rejected(reason.clone()));
        }
        let mut artifacts = self.artifacts.lock();
        artifacts.push((hint.clone(), content.to_string()));
        Ok(format!("memory://{}", artifacts.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_service_order() {
        let service = ScriptedService::new()
            .when("clarif", "{\"questions\": []}")
            .respond("one")
            .fail(ServiceError::transient("reset"))
            .otherwise("rest");
        let hint = GenerationHint::text("x");

        assert_eq!(service.generate("clarify this", &hint).await.unwrap(), "{\"questions\": []}");
        assert_eq!(service.generate("a", &hint).await.unwrap(), "one");
        assert!(service.generate("b", &hint).await.unwrap_err().is_transient());
        assert_eq!(service.generate("c", &hint).await.unwrap(), "rest");
        assert_eq!(service.call_count(), 4);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_fatal() {
        let service = ScriptedService::new();
        let err = service.generate("a", &GenerationHint::text("x")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Fatal { .. }));
    }

    #[tokio::test]
    async fn test_scripted_operator_eof() {
        let operator = ScriptedOperator::new(["yes"]).then_eof();
        assert_eq!(operator.ask("q1").await.unwrap(), Some("yes".to_string()));
        assert_eq!(operator.ask("q2").await.unwrap(), None);
        assert_eq!(operator.ask("q3").await.unwrap(), None);
        assert_eq!(operator.questions(), vec!["q1", "q2", "q3"]);
    }
}

//! The record of one pipeline execution.

use super::StageResult;
use crate::errors::CrewflowError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Pipeline-level inputs, keyed by input name.
pub type InputBindings = BTreeMap<String, String>;

/// State owned by a single pipeline run.
///
/// Results are appended in execution order; each stage has at most one.
/// The run is terminal once [`PipelineRun::finish`] has been called.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    run_id: Uuid,
    pipeline: String,
    inputs: InputBindings,
    results: Vec<StageResult>,
    final_artifact: Option<String>,
    started_at: DateTime<Utc>,
    finished: bool,
}

impl PipelineRun {
    /// Creates a new run for `pipeline`.
    #[must_use]
    pub fn new(pipeline: impl Into<String>, inputs: InputBindings) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            inputs,
            results: Vec::new(),
            final_artifact: None,
            started_at: Utc::now(),
            finished: false,
        }
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Returns the input bindings.
    #[must_use]
    pub fn inputs(&self) -> &InputBindings {
        &self.inputs
    }

    /// Returns a single input binding.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).map(String::as_str)
    }

    /// Appends a stage result.
    ///
    /// # Errors
    ///
    /// Returns `OutputConflict` if the stage already has a result.
    pub fn record(&mut self, result: StageResult) -> Result<(), CrewflowError> {
        if self.result(&result.stage_id).is_some() {
            return Err(CrewflowError::OutputConflict {
                stage: result.stage_id,
            });
        }
        self.results.push(result);
        Ok(())
    }

    /// Returns the result for a stage, if it has run.
    #[must_use]
    pub fn result(&self, stage_id: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage_id == stage_id)
    }

    /// Returns all results in execution order.
    #[must_use]
    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    /// Returns the ids of executed stages in order.
    #[must_use]
    pub fn executed_stages(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.stage_id.as_str()).collect()
    }

    /// Marks the run terminal, capturing the final artifact.
    pub fn finish(&mut self, final_artifact: Option<String>) {
        self.final_artifact = final_artifact;
        self.finished = true;
    }

    /// Returns true once the last stage's result has been captured.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the final artifact, if the last stage succeeded.
    #[must_use]
    pub fn final_artifact(&self) -> Option<&str> {
        self.final_artifact.as_deref()
    }

    /// Consumes the run and returns the final artifact.
    #[must_use]
    pub fn into_artifact(self) -> Option<String> {
        self.final_artifact
    }

    /// Milliseconds since the run started.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings() -> InputBindings {
        InputBindings::from([("requirement".to_string(), "As a user...".to_string())])
    }

    #[test]
    fn test_record_and_lookup() {
        let mut run = PipelineRun::new("story", bindings());
        run.record(StageResult::success("a", "w", "one", Utc::now())).unwrap();
        run.record(StageResult::success("b", "w", "two", Utc::now())).unwrap();

        assert_eq!(run.executed_stages(), vec!["a", "b"]);
        assert_eq!(run.result("b").unwrap().raw_output, "two");
        assert!(run.result("c").is_none());
        assert_eq!(run.input("requirement"), Some("As a user..."));
    }

    #[test]
    fn test_duplicate_result_rejected() {
        let mut run = PipelineRun::new("story", bindings());
        run.record(StageResult::success("a", "w", "one", Utc::now())).unwrap();

        let err = run
            .record(StageResult::success("a", "w", "again", Utc::now()))
            .unwrap_err();
        assert!(matches!(err, CrewflowError::OutputConflict { ref stage } if stage == "a"));
        assert_eq!(run.results().len(), 1);
    }

    #[test]
    fn test_finish() {
        let mut run = PipelineRun::new("story", bindings());
        assert!(!run.is_finished());

        run.finish(Some("artifact".to_string()));
        assert!(run.is_finished());
        assert_eq!(run.final_artifact(), Some("artifact"));
        assert_eq!(run.into_artifact(), Some("artifact".to_string()));
    }

    #[test]
    fn test_runs_have_distinct_ids() {
        let a = PipelineRun::new("story", bindings());
        let b = PipelineRun::new("story", bindings());
        assert_ne!(a.run_id(), b.run_id());
    }
}

//! Per-stage results captured by the sequencer.

use super::structured::{parse_structured, to_context_text};
use super::StageStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The result of executing one stage within a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage id.
    pub stage_id: String,
    /// The worker whose output was kept (the manager, after delegation).
    pub worker_id: String,
    /// Stage status.
    pub status: StageStatus,
    /// Generated text, unchanged.
    pub raw_output: String,
    /// Structured value recovered from the raw output, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,
    /// Error message if failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Generation attempts spent on the stage.
    pub attempts: u32,
    /// Whether the output came from the manager.
    #[serde(default)]
    pub delegated: bool,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    pub ended_at: DateTime<Utc>,
}

impl StageResult {
    /// Creates a successful result, parsing structured output from `raw_output`.
    #[must_use]
    pub fn success(
        stage_id: impl Into<String>,
        worker_id: impl Into<String>,
        raw_output: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let raw_output = raw_output.into();
        let structured = parse_structured(&raw_output);
        Self {
            stage_id: stage_id.into(),
            worker_id: worker_id.into(),
            status: StageStatus::Success,
            raw_output,
            structured,
            error: None,
            attempts: 1,
            delegated: false,
            started_at,
            ended_at: Utc::now(),
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failed(
        stage_id: impl Into<String>,
        worker_id: impl Into<String>,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stage_id: stage_id.into(),
            worker_id: worker_id.into(),
            status: StageStatus::Failed,
            raw_output: String::new(),
            structured: None,
            error: Some(error.into()),
            attempts: 1,
            delegated: false,
            started_at,
            ended_at: Utc::now(),
        }
    }

    /// Sets the number of attempts spent.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Marks the result as produced by the manager.
    #[must_use]
    pub fn delegated(mut self) -> Self {
        self.delegated = true;
        self
    }

    /// The text handed to dependent stages: the structured value rendered
    /// back to JSON when present, otherwise the raw output.
    #[must_use]
    pub fn context_text(&self) -> String {
        self.structured
            .as_ref()
            .map_or_else(|| self.raw_output.clone(), to_context_text)
    }

    /// Returns the duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the stage failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_parses_structure() {
        let result = StageResult::success("skeleton", "po", r#"{"title": "Export"}"#, Utc::now());

        assert!(result.is_success());
        assert_eq!(result.structured, Some(json!({"title": "Export"})));
        assert_eq!(result.raw_output, r#"{"title": "Export"}"#);
    }

    #[test]
    fn test_success_keeps_raw_text_when_unstructured() {
        let raw = "## Issue\nplain markdown";
        let result = StageResult::success("issue", "formatter", raw, Utc::now());

        assert!(result.structured.is_none());
        assert_eq!(result.raw_output, raw);
        assert_eq!(result.context_text(), raw);
    }

    #[test]
    fn test_context_text_prefers_structure() {
        let result = StageResult::success("skeleton", "po", "Sure! {\"a\": 1} done", Utc::now());
        assert_eq!(result.context_text(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn test_failed_result() {
        let result = StageResult::failed("review", "qa", "rejected", Utc::now()).with_attempts(2);

        assert!(result.is_failure());
        assert_eq!(result.error.as_deref(), Some("rejected"));
        assert_eq!(result.attempts, 2);
        assert!(result.raw_output.is_empty());
    }

    #[test]
    fn test_delegated_flag_and_serialization() {
        let result = StageResult::success("review", "manager", "ok", Utc::now()).delegated();
        let json = serde_json::to_string(&result).unwrap();
        let back: StageResult = serde_json::from_str(&json).unwrap();

        assert!(back.delegated);
        assert_eq!(back.stage_id, "review");
        assert_eq!(back.status, StageStatus::Success);
    }
}

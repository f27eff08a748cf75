//! Error types for crewflow.
//!
//! The taxonomy separates conditions that are worth a whole-run retry
//! (transient service failures, unmet dependencies, a missing artifact)
//! from structural problems that must fail before any generation call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for crewflow operations.
#[derive(Debug, Error)]
pub enum CrewflowError {
    /// The pipeline or one of its workers is misconfigured.
    #[error("{0}")]
    Configuration(#[from] PipelineValidationError),

    /// A stage's declared dependency did not succeed.
    #[error("{0}")]
    DependencyUnmet(#[from] DependencyUnmetError),

    /// The generative service failed while a stage was running.
    #[error("Stage '{stage}' generation failed: {source}")]
    Service {
        /// The stage being executed.
        stage: String,
        /// The underlying service failure.
        #[source]
        source: ServiceError,
    },

    /// The retry budget was spent without a successful attempt.
    #[error("{0}")]
    RetriesExhausted(#[from] RetriesExhaustedError),

    /// The last stage of a run failed, so there is no artifact.
    #[error("Stage '{stage}' produced no artifact: {reason}")]
    MissingArtifact {
        /// The final stage of the pipeline.
        stage: String,
        /// Why the stage failed.
        reason: String,
    },

    /// A stage result was recorded twice within one run.
    #[error("Stage '{stage}' already has a result in this run")]
    OutputConflict {
        /// The stage whose result was duplicated.
        stage: String,
    },

    /// The operator boundary failed during clarification.
    #[error("{0}")]
    Operator(#[from] OperatorError),
}

impl CrewflowError {
    /// Returns true if a whole-run retry may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::DependencyUnmet(_) | Self::MissingArtifact { .. } => true,
            Self::Service { source, .. } => source.is_transient(),
            Self::Configuration(_)
            | Self::RetriesExhausted(_)
            | Self::OutputConflict { .. }
            | Self::Operator(_) => false,
        }
    }

    /// Returns the stage the error is attributed to, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::DependencyUnmet(e) => Some(&e.stage),
            Self::Service { stage, .. }
            | Self::MissingArtifact { stage, .. }
            | Self::OutputConflict { stage } => Some(stage),
            Self::RetriesExhausted(e) => e.last_stage.as_deref(),
            Self::Configuration(_) | Self::Operator(_) => None,
        }
    }
}

/// Metadata about a configuration error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONFIG-FORWARD_REF").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline, stage or worker definition is invalid.
///
/// Always raised while building (or before the first generation call of a
/// run), never in the middle of a run.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Shortcut for the common case of a code plus fix hint.
    #[must_use]
    pub fn with_code(self, code: &str, summary: impl Into<String>, hint: &str) -> Self {
        self.with_error_info(ContractErrorInfo::new(code, summary).with_fix_hint(hint))
    }

    /// Returns the error code, if one was attached.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a stage's declared dependency failed.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage}' cannot run: dependency '{dependency}' failed ({reason})")]
pub struct DependencyUnmetError {
    /// The stage that could not run.
    pub stage: String,
    /// The failed dependency.
    pub dependency: String,
    /// Why the dependency failed.
    pub reason: String,
}

impl DependencyUnmetError {
    /// Creates a new dependency unmet error.
    #[must_use]
    pub fn new(
        stage: impl Into<String>,
        dependency: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            dependency: dependency.into(),
            reason: reason.into(),
        }
    }
}

/// Terminal error surfaced once every retry attempt has failed.
#[derive(Debug, Error)]
#[error("Retries exhausted after {attempts} attempt(s){}: {source}", stage_suffix(.last_stage))]
pub struct RetriesExhaustedError {
    /// How many attempts were made.
    pub attempts: usize,
    /// The last stage attempted, if the failure was attributed to one.
    pub last_stage: Option<String>,
    /// The error from the final attempt.
    #[source]
    pub source: Box<CrewflowError>,
}

fn stage_suffix(stage: &Option<String>) -> String {
    stage
        .as_deref()
        .map(|s| format!(" (last stage '{s}')"))
        .unwrap_or_default()
}

/// Failures reported by a generative service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Network or provider failure; another attempt may succeed.
    #[error("Transient service failure: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// The call did not complete in time.
    #[error("Generation timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The provider refused this prompt or returned nothing usable.
    #[error("Generation rejected: {reason}")]
    Rejected {
        /// The provider's reason.
        reason: String,
    },

    /// The service cannot work at all (bad credentials, unknown model).
    #[error("Service unavailable: {message}")]
    Fatal {
        /// Description of the failure.
        message: String,
    },
}

impl ServiceError {
    /// Creates a transient failure.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a rejection.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates a fatal failure.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Returns true for failures that another attempt may fix.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout { .. })
    }

    /// Returns true if the provider refused the prompt.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Failures at the operator (human input) boundary.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Reading the answer failed.
    #[error("Operator input failed: {0}")]
    Io(#[from] std::io::Error),

    /// The input task stopped before producing a line.
    #[error("Operator input task stopped: {0}")]
    Interrupted(String),
}

/// Failures persisting an artifact.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing the artifact failed.
    #[error("Failed to write artifact to {}: {source}", path.display())]
    Io {
        /// The target path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The sink refused the artifact.
    #[error("Artifact rejected by sink: {0}")]
    Rejected(String),
}

/// Failures loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        /// The config path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for `CrewConfig`.
    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        /// The config path.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("CONFIG-TEST", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "draft");

        assert_eq!(info.code, "CONFIG-TEST");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"draft".to_string()));
    }

    #[test]
    fn test_validation_error_code() {
        let err = PipelineValidationError::new("bad")
            .with_code("CONFIG-EMPTY", "empty", "add a stage");
        assert_eq!(err.code(), Some("CONFIG-EMPTY"));
        assert_eq!(PipelineValidationError::new("bad").code(), None);
    }

    #[test]
    fn test_retryable_classification() {
        let transient = CrewflowError::Service {
            stage: "draft".to_string(),
            source: ServiceError::transient("503"),
        };
        let timeout = CrewflowError::Service {
            stage: "draft".to_string(),
            source: ServiceError::Timeout { timeout_ms: 10 },
        };
        let fatal = CrewflowError::Service {
            stage: "draft".to_string(),
            source: ServiceError::fatal("bad key"),
        };
        let unmet = CrewflowError::from(DependencyUnmetError::new("review", "draft", "rejected"));
        let config = CrewflowError::from(PipelineValidationError::new("cycle"));

        assert!(transient.is_retryable());
        assert!(timeout.is_retryable());
        assert!(!fatal.is_retryable());
        assert!(unmet.is_retryable());
        assert!(!config.is_retryable());
    }

    #[test]
    fn test_stage_attribution() {
        let unmet = CrewflowError::from(DependencyUnmetError::new("review", "draft", "rejected"));
        assert_eq!(unmet.stage(), Some("review"));

        let exhausted = CrewflowError::from(RetriesExhaustedError {
            attempts: 3,
            last_stage: Some("review".to_string()),
            source: Box::new(unmet),
        });
        assert_eq!(exhausted.stage(), Some("review"));
        let message = exhausted.to_string();
        assert!(message.contains("3 attempt(s)"));
        assert!(message.contains("last stage 'review'"));
        assert!(message.contains("dependency 'draft' failed"));
    }

    #[test]
    fn test_exhausted_without_stage() {
        let err = RetriesExhaustedError {
            attempts: 1,
            last_stage: None,
            source: Box::new(CrewflowError::from(PipelineValidationError::new("boom"))),
        };
        assert_eq!(err.to_string(), "Retries exhausted after 1 attempt(s): boom");
    }

    #[test]
    fn test_service_error_kinds() {
        assert!(ServiceError::rejected("blocked").is_rejection());
        assert!(!ServiceError::rejected("blocked").is_transient());
        assert!(ServiceError::transient("reset").is_transient());
    }
}

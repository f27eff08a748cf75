//! The generative text boundary.
//!
//! Everything behind [`GenerativeService`] is an external collaborator:
//! the pipeline only submits a prompt with an output hint and receives
//! text or a [`ServiceError`].

#[cfg(feature = "gemini")]
mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiService, DEFAULT_GEMINI_MODEL};

pub use crate::errors::ServiceError;

use crate::core::OutputFormat;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the caller expects back from a generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationHint {
    /// Description of the expected output.
    pub expected_output: String,
    /// Requested output format.
    pub format: OutputFormat,
}

impl GenerationHint {
    /// A hint for free-text output.
    #[must_use]
    pub fn text(expected_output: impl Into<String>) -> Self {
        Self {
            expected_output: expected_output.into(),
            format: OutputFormat::Text,
        }
    }

    /// A hint for JSON output.
    #[must_use]
    pub fn json(expected_output: impl Into<String>) -> Self {
        Self {
            expected_output: expected_output.into(),
            format: OutputFormat::Json,
        }
    }

    /// Returns true if structured output was requested.
    #[must_use]
    pub fn wants_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

/// A stateless text generation backend.
///
/// Calls may fail or time out and identical prompts may produce different
/// text.
#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Name of the backend, for logs.
    fn name(&self) -> &str;

    /// Generates text for `prompt`.
    async fn generate(&self, prompt: &str, hint: &GenerationHint) -> Result<String, ServiceError>;
}

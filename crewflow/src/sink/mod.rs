//! Persistence of the final artifact.
//!
//! Sink failures are reported to the caller as [`SinkError`]; the crew logs
//! them and still returns the artifact.

mod file;

pub use file::{sniff_extension, FileArtifactSink};

pub use crate::errors::SinkError;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What a sink may use to name an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameHint {
    /// The requirement the artifact was produced from.
    pub requirement: String,
    /// An explicit file name from the final stage, if any.
    pub file_name: Option<String>,
    /// Prefix for generated names.
    pub prefix: String,
    /// Extension used when sniffing is off or finds nothing.
    pub fallback_extension: String,
    /// Whether the extension is sniffed from the requirement and content.
    #[serde(default)]
    pub sniff_code: bool,
}

impl NameHint {
    /// Creates a hint with the `output` prefix and a `txt` fallback.
    #[must_use]
    pub fn new(requirement: impl Into<String>) -> Self {
        Self {
            requirement: requirement.into(),
            file_name: None,
            prefix: "output".to_string(),
            fallback_extension: "txt".to_string(),
            sniff_code: false,
        }
    }

    /// Sets an explicit file name.
    #[must_use]
    pub fn with_file_name(mut self, name: Option<String>) -> Self {
        self.file_name = name;
        self
    }

    /// Sets the generated-name prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the fallback extension.
    #[must_use]
    pub fn with_fallback_extension(mut self, extension: impl Into<String>) -> Self {
        self.fallback_extension = extension.into();
        self
    }

    /// Lets the extension follow the code the artifact contains.
    #[must_use]
    pub fn with_code_sniffing(mut self, enabled: bool) -> Self {
        self.sniff_code = enabled;
        self
    }
}

/// Persists final artifacts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Stores `content` and returns where it went.
    async fn persist(&self, hint: &NameHint, content: &str) -> Result<String, SinkError>;
}

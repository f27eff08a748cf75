//! Writes artifacts to a directory.

use super::{ArtifactSink, NameHint};
use crate::errors::SinkError;
use async_trait::async_trait;
use chrono::Local;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static FENCE_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"```(\w+)").unwrap()
});

const REQUIREMENT_KEYWORDS: [(&str, &str); 3] = [("html", "html"), ("python", "py"), ("sql", "sql")];

/// Picks a file extension for an artifact.
///
/// A requirement mentioning html, python or sql wins; then the language tag
/// of the first fenced code block; then `fallback`.
#[must_use]
pub fn sniff_extension(requirement: &str, content: &str, fallback: &str) -> String {
    let requirement = requirement.to_lowercase();
    if let Some((_, ext)) = REQUIREMENT_KEYWORDS
        .iter()
        .find(|(keyword, _)| requirement.contains(keyword))
    {
        return (*ext).to_string();
    }
    FENCE_LANGUAGE
        .captures(content)
        .map_or_else(|| fallback.to_string(), |caps| caps[1].to_lowercase())
}

/// A sink that writes each artifact to its own file.
#[derive(Debug, Clone)]
pub struct FileArtifactSink {
    dir: PathBuf,
}

impl FileArtifactSink {
    /// Creates a sink writing under `dir`, created on first use.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The path an artifact would be written to.
    ///
    /// The extension is sniffed only when the hint asks for it; otherwise
    /// the fallback is used as is.
    #[must_use]
    pub fn target_path(&self, hint: &NameHint, content: &str) -> PathBuf {
        let name = hint.file_name.clone().unwrap_or_else(|| {
            let extension = if hint.sniff_code {
                sniff_extension(&hint.requirement, content, &hint.fallback_extension)
            } else {
                hint.fallback_extension.clone()
            };
            format!("{}_{}.{extension}", hint.prefix, Local::now().format("%Y%m%d_%H%M%S"))
        });
        self.dir.join(name)
    }
}

#[async_trait]
impl ArtifactSink for FileArtifactSink {
    async fn persist(&self, hint: &NameHint, content: &str) -> Result<String, SinkError> {
        let path = self.target_path(hint, content);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SinkError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "Artifact written");
        Ok(path.display().to_string())
    }
}

//! Prompt templates with `{identifier}` placeholders.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap()
});

/// A prompt template.
///
/// Only `{identifier}` is a placeholder; other brace text, such as a JSON
/// example, is kept literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    placeholders: Vec<String>,
}

impl PromptTemplate {
    /// Parses a template.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut placeholders: Vec<String> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&source) {
            let name = &caps[1];
            if !placeholders.iter().any(|p| p == name) {
                placeholders.push(name.to_string());
            }
        }
        Self {
            source,
            placeholders,
        }
    }

    /// Returns the template text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Placeholder names in order of first appearance.
    #[must_use]
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Returns true if the template references `name`.
    #[must_use]
    pub fn references(&self, name: &str) -> bool {
        self.placeholders.iter().any(|p| p == name)
    }

    /// Substitutes bound placeholders; unbound ones are left as written.
    #[must_use]
    pub fn render(&self, bindings: &BTreeMap<&str, &str>) -> String {
        PLACEHOLDER
            .replace_all(&self.source, |caps: &regex::Captures<'_>| {
                bindings
                    .get(&caps[1])
                    .map_or_else(|| caps[0].to_string(), |value| (*value).to_string())
            })
            .into_owned()
    }
}

impl From<&str> for PromptTemplate {
    fn from(source: &str) -> Self {
        Self::new(source)
    }
}

impl From<String> for PromptTemplate {
    fn from(source: String) -> Self {
        Self::new(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_placeholders_in_order_without_duplicates() {
        let template = PromptTemplate::new("{requirement} then {skeleton} and {requirement}");
        assert_eq!(template.placeholders(), ["requirement", "skeleton"]);
        assert!(template.references("skeleton"));
        assert!(!template.references("plan"));
    }

    #[test]
    fn test_json_examples_are_literal() {
        let template = PromptTemplate::new(
            "Return {\"title\": \"...\", \"as_a\": \"...\"} for {requirement}. Use { spaced } too.",
        );
        assert_eq!(template.placeholders(), ["requirement"]);
    }

    #[test]
    fn test_render() {
        let template = PromptTemplate::new("Story: {requirement}\nKeep {unknown}\n{\"k\": 1}");
        let bindings = BTreeMap::from([("requirement", "As a user...")]);
        assert_eq!(
            template.render(&bindings),
            "Story: As a user...\nKeep {unknown}\n{\"k\": 1}"
        );
    }

    #[test]
    fn test_render_does_not_expand_substituted_text() {
        let template = PromptTemplate::new("{a}");
        let bindings = BTreeMap::from([("a", "{b}"), ("b", "nested")]);
        assert_eq!(template.render(&bindings), "{b}");
    }
}

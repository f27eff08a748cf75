//! Questions and answers gathered before the main pipeline runs.

use crate::core::parse_structured;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;

/// Heading of the appendix added to the requirement.
pub const CLARIFICATIONS_HEADING: &str = "Clarifications:";

/// One clarification flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationSession {
    original: String,
    questions: Vec<String>,
    answers: Vec<(String, String)>,
}

impl ClarificationSession {
    /// Starts a session for `original`.
    #[must_use]
    pub fn new(original: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            questions: Vec::new(),
            answers: Vec::new(),
        }
    }

    /// Stores the proposed questions, keeping at most `max_questions`.
    pub fn propose(&mut self, questions: Vec<String>, max_questions: usize) {
        self.questions = questions;
        self.questions.truncate(max_questions);
    }

    /// Records the answer to a question.
    pub fn record_answer(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.answers.push((question.into(), answer.into()));
    }

    /// Returns the original requirement.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Returns the proposed questions.
    #[must_use]
    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    /// Returns the recorded question/answer pairs.
    #[must_use]
    pub fn answers(&self) -> &[(String, String)] {
        &self.answers
    }

    /// Returns true if at least one question was answered (even blank).
    #[must_use]
    pub fn has_answers(&self) -> bool {
        !self.answers.is_empty()
    }

    /// The requirement followed by a `Clarifications:` appendix listing
    /// every pair in question order. Unchanged when nothing was asked.
    #[must_use]
    pub fn enriched(&self) -> String {
        if self.answers.is_empty() {
            return self.original.clone();
        }
        let mut text = self.original.trim_end().to_string();
        text.push_str("\n\n");
        text.push_str(CLARIFICATIONS_HEADING);
        for (i, (question, answer)) in self.answers.iter().enumerate() {
            let answer = if answer.trim().is_empty() {
                "(no answer)"
            } else {
                answer.trim()
            };
            let _ = write!(&mut text, "\n{}. Q: {}\n   A: {answer}", i + 1, question.trim());
        }
        text
    }
}

/// Extracts clarification questions from a clarifier's output.
///
/// Accepts `{"questions": [...]}` or a bare array. Anything else, and
/// non-string or blank entries, count as no questions.
#[must_use]
pub fn parse_questions(raw: &str) -> Vec<String> {
    let items = match parse_structured(raw) {
        Some(Value::Object(mut map)) => match map.remove("questions") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_no_answers_leaves_input_unchanged() {
        let session = ClarificationSession::new("As a user, I want X so that Y");
        assert_eq!(session.enriched(), "As a user, I want X so that Y");
        assert!(!session.has_answers());
    }

    #[test]
    fn test_enriched_lists_pairs_in_order() {
        let mut session = ClarificationSession::new("As a user, I want X so that Y\n");
        session.propose(vec!["Which users?".to_string(), "Which format?".to_string()], 3);
        session.record_answer("Which users?", "Admins");
        session.record_answer("Which format?", "");

        assert_eq!(
            session.enriched(),
            "As a user, I want X so that Y\n\nClarifications:\n1. Q: Which users?\n   A: Admins\n2. Q: Which format?\n   A: (no answer)"
        );
    }

    #[test]
    fn test_propose_truncates() {
        let mut session = ClarificationSession::new("x");
        session.propose(vec!["a".into(), "b".into(), "c".into()], 2);
        assert_eq!(session.questions(), ["a", "b"]);
    }

    #[test]
    fn test_parse_questions_shapes() {
        assert_eq!(
            parse_questions(r#"{"questions": ["Who?", " ", 3, "Why?"]}"#),
            vec!["Who?", "Why?"]
        );
        assert_eq!(parse_questions(r#"Sure: ["Who?"]"#), vec!["Who?"]);
        assert!(parse_questions(r#"{"questions": []}"#).is_empty());
        assert!(parse_questions(r#"{"other": ["Who?"]}"#).is_empty());
        assert!(parse_questions("No questions, all clear.").is_empty());
    }
}

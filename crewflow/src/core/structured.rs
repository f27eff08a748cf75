//! Best-effort extraction of structured output from generated text.
//!
//! Generation backends do not reliably honour a requested schema. Parsing
//! therefore degrades in three tiers and never fails:
//!
//! 1. the whole (trimmed) text parses as a JSON object or array;
//! 2. the outermost bracket-delimited span inside surrounding prose parses;
//! 3. nothing parses, and the caller keeps only the raw text.

use serde_json::Value;

/// Parses structured output from raw generated text.
///
/// Only objects and arrays count as structured output; a bare number or
/// string is left as plain text.
#[must_use]
pub fn parse_structured(raw: &str) -> Option<Value> {
    if let Some(value) = parse_container(raw.trim()) {
        return Some(value);
    }

    for span in bracket_spans(raw) {
        if let Some(value) = parse_container(span) {
            return Some(value);
        }
    }

    tracing::debug!(len = raw.len(), "No structured content in generated output");
    None
}

/// Renders a structured value back to text for use in a downstream prompt.
#[must_use]
pub fn to_context_text(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn parse_container(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Candidate spans from the first opener to the last matching closer,
/// outermost (earliest opener) first.
///
/// Only one span per bracket kind is tried. A stray `{` in the prose before
/// the JSON widens the object span past it, so that output degrades to
/// plain text.
fn bracket_spans(raw: &str) -> Vec<&str> {
    let mut spans: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| {
            let start = raw.find(open)?;
            let end = raw.rfind(close)?;
            (end > start).then(|| (start, &raw[start..=end]))
        })
        .collect();
    spans.sort_by_key(|(start, _)| *start);
    spans.into_iter().map(|(_, span)| span).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_strict_object_round_trips() {
        let value = json!({"title": "Login", "as_a": "user", "i_want": "to log in", "so_that": "I can work"});
        let raw = serde_json::to_string(&value).unwrap();

        assert_eq!(parse_structured(&raw), Some(value));
    }

    #[test]
    fn test_strict_array_with_whitespace() {
        assert_eq!(parse_structured("  \n[1, 2, 3]\n"), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_embedded_object_recovered() {
        let raw = "Here is the story skeleton:\n```json\n{\"title\": \"Export\", \"tags\": [\"csv\"]}\n```\nLet me know!";

        assert_eq!(
            parse_structured(raw),
            Some(json!({"title": "Export", "tags": ["csv"]}))
        );
    }

    #[test]
    fn test_embedded_array_recovered() {
        let raw = "Questions follow: [\"Which roles?\", \"Which format?\"] end.";

        assert_eq!(
            parse_structured(raw),
            Some(json!(["Which roles?", "Which format?"]))
        );
    }

    #[test]
    fn test_object_preferred_when_it_is_outermost() {
        let raw = "Result: {\"tasks\": [{\"desc\": \"api\", \"points\": 3}], \"checklist\": [\"ready\"]} done";

        assert_eq!(
            parse_structured(raw),
            Some(json!({"tasks": [{"desc": "api", "points": 3}], "checklist": ["ready"]}))
        );
    }

    #[test]
    fn test_falls_back_to_inner_span_when_outer_fails() {
        let raw = "[draft] the object is {\"score\": 80}";

        assert_eq!(parse_structured(raw), Some(json!({"score": 80})));
    }

    #[test]
    fn test_stray_brace_before_json_degrades_to_text() {
        let raw = "Fill in the {name field first. Result: {\"a\": 1}";
        assert_eq!(parse_structured(raw), None);
    }

    #[test]
    fn test_plain_text_is_unstructured() {
        assert_eq!(parse_structured("# Issue\n\nJust markdown, no data."), None);
    }

    #[test]
    fn test_scalars_are_unstructured() {
        assert_eq!(parse_structured("42"), None);
        assert_eq!(parse_structured("\"quoted\""), None);
    }

    #[test]
    fn test_broken_json_is_unstructured() {
        assert_eq!(parse_structured("{\"title\": \"unterminated"), None);
    }

    #[test]
    fn test_to_context_text_is_pretty() {
        let text = to_context_text(&json!({"a": 1}));
        assert_eq!(text, "{\n  \"a\": 1\n}");
    }
}

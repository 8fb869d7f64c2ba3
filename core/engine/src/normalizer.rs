//! Recovery of JSON values from chat-model replies.
//!
//! Models asked for JSON often wrap it in a markdown code fence anyway. The
//! normalizer strips one fence and parses what is left; anything else is
//! reported as a malformed response. There is deliberately no attempt to dig
//! a JSON object out of surrounding prose.

use serde::de::{DeserializeOwned, Error as _};
use serde_json::Value;
use study_desk_schemas::{Message, MessageRole};
use tracing::warn;

use crate::error::NormalizeError;

/// Appended to the final user message of every JSON-mode request.
pub const JSON_INSTRUCTION: &str =
    "\nRespond in JSON format; do not include markdown code fences.";

const FENCE: &str = "```";

/// How much of a rejected reply is kept in the error for diagnostics.
const EXCERPT_CHARS: usize = 80;

/// Ask for bare JSON by extending the last message, if it is a user message.
pub fn with_json_instruction(mut messages: Vec<Message>) -> Vec<Message> {
    if let Some(last) = messages.last_mut() {
        if last.role == MessageRole::User {
            last.content.push_str(JSON_INSTRUCTION);
        }
    }
    messages
}

/// Remove a surrounding markdown code fence, if the reply opens with one.
///
/// The opening line (which may carry a language tag) is dropped; a fence
/// with no newline at all loses just its three backticks. A closing fence is
/// only removed when an opening one was present.
pub fn strip_code_fence(raw: &str) -> &str {
    let text = raw.trim();
    if !text.starts_with(FENCE) {
        return text;
    }

    let body = match text.find('\n') {
        Some(newline) => &text[newline + 1..],
        None => &text[FENCE.len()..],
    };
    let body = body.strip_suffix(FENCE).unwrap_or(body);

    body.trim()
}

/// Parse a reply into an untyped JSON object or array.
pub fn normalize(raw: &str) -> Result<Value, NormalizeError> {
    let value: Value = normalize_as(raw)?;
    match value {
        Value::Object(_) | Value::Array(_) => Ok(value),
        other => Err(malformed(
            serde_json::Error::custom(format!(
                "expected a JSON object or array, found {}",
                kind_of(&other)
            )),
            raw,
        )),
    }
}

/// Parse a reply straight into the shape a call site expects.
pub fn normalize_as<T: DeserializeOwned>(raw: &str) -> Result<T, NormalizeError> {
    serde_json::from_str(strip_code_fence(raw)).map_err(|source| malformed(source, raw))
}

fn malformed(source: serde_json::Error, raw: &str) -> NormalizeError {
    let excerpt: String = raw.trim().chars().take(EXCERPT_CHARS).collect();
    warn!("Discarding malformed model reply: {}", source);
    NormalizeError::MalformedResponse { source, excerpt }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Cues {
        cues: Vec<String>,
    }

    fn assert_malformed<T: std::fmt::Debug>(result: Result<T, NormalizeError>) {
        match result {
            Err(NormalizeError::MalformedResponse { .. }) => {}
            other => panic!("expected MalformedResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_json() {
        assert_eq!(normalize(r#"{"a":1}"#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_fenced_json_with_language_tag() {
        let raw = "```json\n{\"a\":1}\n```";
        assert_eq!(normalize(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_fenced_json_without_language_tag() {
        let raw = "```\n[1, 2, 3]\n```";
        assert_eq!(normalize(raw).unwrap(), json!([1, 2, 3]));
    }

    #[test]
    fn test_fence_without_newline() {
        assert_eq!(normalize("```{\"a\":1}```").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_surrounding_whitespace_and_crlf() {
        let raw = "  \r\n```json\r\n{\"a\": [true]}\r\n```  \n\n";
        assert_eq!(normalize(raw).unwrap(), json!({"a": [true]}));
    }

    #[test]
    fn test_missing_closing_fence() {
        let raw = "```json\n{\"a\":1}";
        assert_eq!(normalize(raw).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_prose_is_malformed() {
        assert_malformed(normalize("not json"));
        assert_malformed(normalize("Sure! Here you go: {\"a\":1}"));
    }

    #[test]
    fn test_empty_is_malformed() {
        assert_malformed(normalize(""));
        assert_malformed(normalize("   \n"));
        assert_malformed(normalize("```"));
    }

    #[test]
    fn test_truncated_is_malformed() {
        assert_malformed(normalize("{\"a\": [1, 2"));
    }

    #[test]
    fn test_closing_fence_alone_is_not_stripped() {
        assert_malformed(normalize("{\"a\":1}\n```"));
    }

    #[test]
    fn test_scalar_is_rejected() {
        assert_malformed(normalize("42"));
        assert_malformed(normalize("\"hello\""));
    }

    #[test]
    fn test_normalize_as_enforces_shape() {
        let cues: Cues = normalize_as("```json\n{\"cues\": [\"borrow\"]}\n```").unwrap();
        assert_eq!(cues.cues, vec!["borrow".to_string()]);

        assert_malformed(normalize_as::<Cues>(r#"{"summary": "no cues"}"#));
        assert_malformed(normalize_as::<Vec<Cues>>(r#"{"cues": []}"#));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let raw = "x".repeat(500);
        match normalize(&raw) {
            Err(NormalizeError::MalformedResponse { excerpt, .. }) => {
                assert_eq!(excerpt.len(), EXCERPT_CHARS);
            }
            other => panic!("expected MalformedResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_reserialized_value_is_stable() {
        let inputs = [
            "```json\n{\"b\": {\"c\": [1, 2.5, null]}, \"a\": \"x\"}\n```",
            "[{\"question\": \"q\", \"hints\": []}]",
        ];

        for raw in inputs {
            let first = normalize(raw).unwrap();
            let again = normalize(&serde_json::to_string(&first).unwrap()).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_json_instruction_targets_last_user_message() {
        let messages = with_json_instruction(vec![
            Message::system("You grade essays."),
            Message::user("Grade this."),
        ]);
        assert_eq!(messages[0].content, "You grade essays.");
        assert_eq!(messages[1].content, format!("Grade this.{}", JSON_INSTRUCTION));
    }

    #[test]
    fn test_json_instruction_skips_non_user_tail() {
        let messages = with_json_instruction(vec![
            Message::user("Hi"),
            Message::assistant("Hello"),
        ]);
        assert_eq!(messages[0].content, "Hi");
        assert_eq!(messages[1].content, "Hello");

        assert!(with_json_instruction(Vec::new()).is_empty());
    }
}

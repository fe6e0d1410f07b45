//! Turning raw model replies into `AgentResponse`s.
//!
//! A reply is first read as a strict JSON turn (`{"thought", "action",
//! "final_answer"}`), which is what the model returns when structured output
//! is requested. Anything else goes through `TextMarkerAdapter`, which reads
//! the `THOUGHT:` / `ACTION:` / `FINAL ANSWER:` free-text convention.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::types::{Action, AgentResponse};
use crate::models::FinalAnswer;

pub const THOUGHT_MARKER: &str = "THOUGHT:";
pub const ACTION_MARKER: &str = "ACTION:";
pub const FINAL_ANSWER_MARKER: &str = "FINAL ANSWER:";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StructuredTurn {
    thought: String,
    #[serde(default)]
    action: Option<ActionBlock>,
    #[serde(default)]
    final_answer: Option<Value>,
}

#[derive(Deserialize)]
struct ActionBlock {
    tool: String,
    #[serde(default)]
    tool_input: Map<String, Value>,
}

/// JSON schema for structured turns, passed to the model as its output format.
pub fn structured_turn_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "thought": {"type": "string"},
            "action": {
                "type": ["object", "null"],
                "properties": {
                    "tool": {"type": "string"},
                    "tool_input": {"type": "object"}
                },
                "required": ["tool", "tool_input"]
            },
            "final_answer": {
                "type": ["object", "null"],
                "properties": {
                    "lyrics": {"type": "string"},
                    "vocabulary": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "word": {"type": "string"},
                                "reading": {"type": "string"},
                                "meaning": {"type": "string"},
                                "part_of_speech": {"type": "string"},
                                "difficulty_level": {"type": "string"}
                            },
                            "required": ["word"]
                        }
                    }
                },
                "required": ["lyrics", "vocabulary"]
            }
        },
        "required": ["thought"]
    })
}

/// Parse a reply, preferring the structured form.
pub fn parse_response(text: &str) -> AgentResponse {
    parse_structured(text).unwrap_or_else(|| TextMarkerAdapter::parse(text))
}

/// Read the reply as a strict JSON turn. `None` if it is not one.
pub fn parse_structured(text: &str) -> Option<AgentResponse> {
    let turn: StructuredTurn = serde_json::from_str(text.trim()).ok()?;

    let final_answer = turn.final_answer.and_then(|value| {
        serde_json::from_value::<FinalAnswer>(value)
            .map_err(|e| tracing::error!("Structured final answer has the wrong shape: {}", e))
            .ok()
    });

    let action = turn.action.map(|block| Action {
        tool: block.tool,
        tool_input: block.tool_input,
        thought: turn.thought.clone(),
    });

    Some(AgentResponse {
        thought: turn.thought,
        action,
        final_answer,
    })
}

/// Tolerant parser for the free-text marker convention.
pub struct TextMarkerAdapter;

impl TextMarkerAdapter {
    pub fn parse(text: &str) -> AgentResponse {
        let final_answer = Self::final_answer(text);
        let thought = Self::thought(text);
        let action = if final_answer.is_none() && text.contains(THOUGHT_MARKER) {
            Self::action(text, thought.as_deref().unwrap_or_default())
        } else {
            None
        };

        AgentResponse {
            thought: thought.unwrap_or_default(),
            action,
            final_answer,
        }
    }

    /// Content after `FINAL ANSWER:` if it is a well-formed answer.
    fn final_answer(text: &str) -> Option<FinalAnswer> {
        let (_, trailing) = text.split_once(FINAL_ANSWER_MARKER)?;
        let trailing = trailing.trim();

        let parsed = serde_json::from_str::<FinalAnswer>(trailing).or_else(|e| {
            first_balanced_object(trailing)
                .ok_or(e)
                .and_then(serde_json::from_str::<FinalAnswer>)
        });

        match parsed {
            Ok(answer) => Some(answer),
            Err(e) => {
                tracing::error!("Failed to parse final answer: {}", trailing);
                tracing::error!("JSON decode error: {}", e);
                None
            }
        }
    }

    /// Text between `THOUGHT:` and the next marker.
    fn thought(text: &str) -> Option<String> {
        let (_, rest) = text.split_once(THOUGHT_MARKER)?;
        let end = [ACTION_MARKER, THOUGHT_MARKER, FINAL_ANSWER_MARKER]
            .iter()
            .filter_map(|marker| rest.find(marker))
            .min()
            .unwrap_or(rest.len());
        Some(rest[..end].trim().to_string())
    }

    /// First balanced `{...}` after `ACTION:`, read as `{tool, tool_input}`.
    fn action(text: &str, thought: &str) -> Option<Action> {
        let (_, rest) = text.split_once(ACTION_MARKER)?;
        let Some(block) = first_balanced_object(rest) else {
            tracing::error!("No JSON object after {}: {}", ACTION_MARKER, rest.trim());
            return None;
        };

        match serde_json::from_str::<ActionBlock>(block) {
            Ok(parsed) => Some(Action {
                tool: parsed.tool,
                tool_input: parsed.tool_input,
                thought: thought.to_string(),
            }),
            Err(e) => {
                tracing::error!("Failed to parse action: {}", block);
                tracing::error!("JSON decode error: {}", e);
                None
            }
        }
    }
}

/// The first `{...}` substring whose braces balance, ignoring braces inside
/// JSON string literals.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_object_ignores_braces_in_strings() {
        let text = r#"ACTION: {"tool": "x", "tool_input": {"q": "a } b {"}} trailing {"other": 1}"#;
        assert_eq!(
            first_balanced_object(text),
            Some(r#"{"tool": "x", "tool_input": {"q": "a } b {"}}"#)
        );
        assert_eq!(first_balanced_object("{ unterminated"), None);
        assert_eq!(first_balanced_object("no braces"), None);
        assert_eq!(
            first_balanced_object(r#"{"q": "say \"}\""}"#),
            Some(r#"{"q": "say \"}\""}"#)
        );
    }

    #[test]
    fn parses_thought_and_action() {
        let text = r#"THOUGHT: I should search for the lyrics first.
ACTION: {"tool": "search_web_ddg", "tool_input": {"query": "Lemon Kenshi Yonezu", "max_results": 3}}"#;
        let response = parse_response(text);
        assert_eq!(response.thought, "I should search for the lyrics first.");
        let action = response.action.expect("action");
        assert_eq!(action.tool, "search_web_ddg");
        assert_eq!(action.tool_input["query"], "Lemon Kenshi Yonezu");
        assert_eq!(action.tool_input["max_results"], 3);
        assert_eq!(action.thought, response.thought);
        assert!(response.final_answer.is_none());
    }

    #[test]
    fn action_without_thought_marker_is_ignored() {
        let text = r#"ACTION: {"tool": "search_web_ddg", "tool_input": {"query": "Lemon"}}"#;
        assert!(parse_response(text).action.is_none());
    }

    #[test]
    fn missing_tool_input_defaults_to_empty() {
        let text = r#"THOUGHT: hmm
ACTION: {"tool": "generate_song_id"}"#;
        let action = parse_response(text).action.expect("action");
        assert!(action.tool_input.is_empty());
    }

    #[test]
    fn malformed_action_yields_no_action() {
        let text = "THOUGHT: try\nACTION: {\"tool\": search_web_ddg}";
        let response = parse_response(text);
        assert_eq!(response.thought, "try");
        assert!(response.action.is_none());
    }

    #[test]
    fn final_answer_wins_over_action() {
        let text = r#"THOUGHT: done
ACTION: {"tool": "save_results", "tool_input": {}}
FINAL ANSWER: {"lyrics": "夢ならば", "vocabulary": [{"word": "夢"}]}"#;
        let response = parse_response(text);
        let answer = response.final_answer.expect("final answer");
        assert_eq!(answer.lyrics, "夢ならば");
        assert_eq!(answer.vocabulary[0].word, "夢");
        assert!(response.action.is_none());
    }

    #[test]
    fn malformed_final_answer_falls_back_to_action() {
        let text = r#"THOUGHT: need vocabulary
ACTION: {"tool": "extract_vocabulary", "tool_input": {"lyrics": "夢"}}
FINAL ANSWER: {"lyrics": "夢"}"#;
        let response = parse_response(text);
        assert!(response.final_answer.is_none());
        assert_eq!(response.action.expect("action").tool, "extract_vocabulary");
    }

    #[test]
    fn final_answer_inside_code_fence() {
        let text = "FINAL ANSWER:\n```json\n{\"lyrics\": \"x\", \"vocabulary\": []}\n```";
        let answer = parse_response(text).final_answer.expect("final answer");
        assert_eq!(answer.lyrics, "x");
    }

    #[test]
    fn structured_turn_is_preferred() {
        let text = r#"{"thought": "look it up", "action": {"tool": "search_web_serp", "tool_input": {"query": "Lemon"}}, "final_answer": null}"#;
        let response = parse_structured(text).expect("structured");
        assert_eq!(response.thought, "look it up");
        assert_eq!(response.action.expect("action").tool, "search_web_serp");

        let done = r#"{"thought": "done", "final_answer": {"lyrics": "l", "vocabulary": []}}"#;
        assert_eq!(parse_response(done).final_answer.expect("answer").lyrics, "l");
    }

    #[test]
    fn arbitrary_json_is_not_a_structured_turn() {
        assert!(parse_structured(r#"{"lyrics": "x", "vocabulary": []}"#).is_none());
        assert!(parse_structured("THOUGHT: plain text").is_none());
    }
}

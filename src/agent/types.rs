//! Agent turn and outcome types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llm::ChatMessage;
use crate::models::FinalAnswer;

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    pub tool: String,
    pub tool_input: Map<String, Value>,
    pub thought: String,
}

/// One parsed model turn.
///
/// At most one of `action`/`final_answer` is acted on; a final answer wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentResponse {
    pub thought: String,
    pub action: Option<Action>,
    pub final_answer: Option<FinalAnswer>,
}

/// What a request produces: the final answer, or `{"error": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AgentOutcome {
    Final(FinalAnswer),
    Error { error: String },
}

impl AgentOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Append-only conversation for one request.
#[derive(Debug, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>, request: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(request)],
        }
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// A single entry in the run log.
#[derive(Debug, Clone, Serialize)]
pub struct TurnLogEntry {
    /// Timestamp (RFC 3339)
    pub timestamp: String,

    /// 1-based turn number
    pub turn: usize,

    pub entry_type: LogEntryType,

    pub content: String,
}

/// Types of log entries.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryType {
    /// Model reasoning
    Thinking,
    /// Tool is being called
    ToolCall,
    /// Tool returned a result
    ToolResult,
    /// Model produced the final answer
    Response,
    /// Turn failed or produced nothing usable
    Error,
}

/// Full record of one request.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub outcome: AgentOutcome,
    /// Turns started, including the one that ended the run.
    pub turns: usize,
    pub log: Vec<TurnLogEntry>,
}

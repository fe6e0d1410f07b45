//! Agent module - the ReAct loop that finds lyrics and builds vocabulary.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build the transcript from the system prompt and the user request
//! 2. Ask the model for its next turn
//! 3. If the turn carries a final answer, return it
//! 4. If it carries an action, run the tool and append the result
//! 5. Repeat until a final answer or the turn limit

mod agent_loop;
mod parse;
mod prompt;
mod types;

pub use agent_loop::{Agent, AgentSettings};
pub use parse::{
    first_balanced_object, parse_response, parse_structured, structured_turn_schema,
    TextMarkerAdapter, ACTION_MARKER, FINAL_ANSWER_MARKER, THOUGHT_MARKER,
};
pub use prompt::build_system_prompt;
pub use types::{
    Action, AgentOutcome, AgentResponse, AgentRun, LogEntryType, Transcript, TurnLogEntry,
};

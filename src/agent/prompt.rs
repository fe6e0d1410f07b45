//! System prompt for the lyrics agent.

use std::path::Path;

use crate::tools::ToolRegistry;

/// File in the prompts directory that replaces the built-in instructions.
pub const PROMPT_FILE: &str = "lyrics_agent.md";

const DEFAULT_INSTRUCTIONS: &str = r#"You are a ReAct agent that finds Japanese song lyrics and builds a vocabulary list for language learners.

Work in turns. In every turn respond with exactly one of the following.

To use a tool:
THOUGHT: <why you are calling the tool>
ACTION: {"tool": "<tool name>", "tool_input": {<keyword arguments>}}

When you have the lyrics and the vocabulary:
FINAL ANSWER: {"title": "<title>", "artist": "<artist>", "lyrics": "<full lyrics>", "vocabulary": [{"word": "...", "reading": "...", "meaning": "...", "part_of_speech": "...", "difficulty_level": "..."}]}

Rules:
1. Search for the lyrics, then fetch the most promising page to read them.
2. Use the original Japanese lyrics, not a translation or romanization.
3. Extract vocabulary from the lyrics with extract_vocabulary.
4. Generate a song id and save the results before giving the final answer.
5. The FINAL ANSWER must be valid JSON and nothing may follow it."#;

/// Build the system prompt: instructions (file override or built-in) plus tool list.
pub async fn build_system_prompt(prompts_dir: &Path, tools: &ToolRegistry) -> String {
    let path = prompts_dir.join(PROMPT_FILE);
    let instructions = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Using built-in agent prompt ({}: {})", path.display(), e);
            DEFAULT_INSTRUCTIONS.to_string()
        }
    };

    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{instructions}\n\n## Available Tools\n{tool_descriptions}",
        instructions = instructions.trim_end(),
        tool_descriptions = tool_descriptions
    )
}

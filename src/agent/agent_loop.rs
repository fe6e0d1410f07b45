//! Core agent loop implementation.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use serde_json::{json, Value};

use super::parse::{parse_response, structured_turn_schema};
use super::prompt::build_system_prompt;
use super::types::{AgentOutcome, AgentRun, LogEntryType, Transcript, TurnLogEntry};
use crate::config::Config;
use crate::llm::{ChatRequest, LlmClient, LlmError, OllamaClient};
use crate::store::SharedResultStore;
use crate::tools::{RetryPolicy, ToolContext, ToolExecutor, ToolRegistry};

const TURN_LIMIT_MESSAGE: &str = "Reached maximum turns without completing the task";

/// Per-agent settings.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub max_turns: usize,
    /// Ask the model for JSON turns matching `structured_turn_schema`.
    pub structured_output: bool,
    pub prompts_dir: PathBuf,
}

impl From<&Config> for AgentSettings {
    fn from(config: &Config) -> Self {
        Self {
            model: config.default_model.clone(),
            max_turns: config.max_turns,
            structured_output: config.structured_output,
            prompts_dir: config.prompts_dir.clone(),
        }
    }
}

/// The lyrics and vocabulary agent.
///
/// Each call to [`Agent::run`] owns its transcript and turn counter, so one
/// agent can serve concurrent requests.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    settings: AgentSettings,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmClient>, executor: ToolExecutor, settings: AgentSettings) -> Self {
        Self {
            llm,
            executor,
            settings,
        }
    }

    /// Wire up the Ollama client and the default tools.
    pub fn from_config(config: &Config, store: SharedResultStore) -> Result<Self, LlmError> {
        let llm: Arc<dyn LlmClient> =
            Arc::new(OllamaClient::new(&config.ollama_url, config.http_timeout)?);

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        let registry = ToolRegistry::with_defaults(ToolContext {
            llm: Arc::clone(&llm),
            model: config.default_model.clone(),
            store,
            http,
            serp_api_key: config.serp_api_key.clone(),
            prompts_dir: config.prompts_dir.clone(),
        });
        let executor = ToolExecutor::new(registry, RetryPolicy::from(&config.retry));

        tracing::info!(
            "Agent ready: model={}, max_turns={}",
            config.default_model,
            config.max_turns
        );
        Ok(Self::new(llm, executor, AgentSettings::from(config)))
    }

    /// Process a request and return only its outcome.
    pub async fn process_request(&self, message: &str) -> AgentOutcome {
        self.run(message).await.outcome
    }

    /// Process a request, keeping the turn log.
    pub async fn run(&self, message: &str) -> AgentRun {
        tracing::info!("Starting new request: {}", message);

        let max_turns = self.settings.max_turns;
        let mut log = Vec::new();
        let system_prompt =
            build_system_prompt(&self.settings.prompts_dir, self.executor.registry()).await;
        let mut transcript = Transcript::new(system_prompt, message);
        let format = self
            .settings
            .structured_output
            .then(structured_turn_schema);

        for turn in 1..=max_turns {
            tracing::info!("[Turn {}/{}] Getting next action from model", turn, max_turns);

            let response = match self
                .llm
                .chat(ChatRequest {
                    model: &self.settings.model,
                    messages: transcript.messages(),
                    format: format.clone(),
                })
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!("Error in turn {}: {}", turn, e);
                    let error = format!("Error in turn {}: {}", turn, e);
                    push_log(&mut log, turn, LogEntryType::Error, &error);
                    return AgentRun {
                        outcome: AgentOutcome::error(error),
                        turns: turn,
                        log,
                    };
                }
            };
            tracing::debug!("Raw response: {}", response.content);

            let parsed = parse_response(&response.content);

            if let Some(answer) = parsed.final_answer {
                tracing::info!("Found final answer on turn {}", turn);
                push_log(
                    &mut log,
                    turn,
                    LogEntryType::Response,
                    &truncate_for_log(&response.content, 2000),
                );
                return AgentRun {
                    outcome: AgentOutcome::Final(answer),
                    turns: turn,
                    log,
                };
            }

            if !parsed.thought.is_empty() {
                push_log(&mut log, turn, LogEntryType::Thinking, &parsed.thought);
            }

            let Some(action) = parsed.action else {
                tracing::warn!("No usable action in turn {}", turn);
                push_log(
                    &mut log,
                    turn,
                    LogEntryType::Error,
                    "Response contained no final answer or action",
                );
                continue;
            };

            let action_json = json!({
                "tool": action.tool,
                "tool_input": action.tool_input,
                "thought": action.thought,
            });
            push_log(
                &mut log,
                turn,
                LogEntryType::ToolCall,
                &format!("Calling tool: {} with args: {}", action.tool, action_json["tool_input"]),
            );

            let args = Value::Object(action.tool_input.clone());
            let executed = AssertUnwindSafe(self.executor.execute(&action.tool, args))
                .catch_unwind()
                .await;
            let executed = match executed {
                Ok(executed) => executed,
                Err(panic) => {
                    let error = format!(
                        "Error in turn {}: tool {} panicked: {}",
                        turn,
                        action.tool,
                        panic_message(&*panic)
                    );
                    tracing::error!("{}", error);
                    push_log(&mut log, turn, LogEntryType::Error, &error);
                    return AgentRun {
                        outcome: AgentOutcome::error(error),
                        turns: turn,
                        log,
                    };
                }
            };

            match executed {
                Ok(result) => {
                    push_log(
                        &mut log,
                        turn,
                        LogEntryType::ToolResult,
                        &truncate_for_log(&result.to_string(), 1000),
                    );
                    transcript.push_assistant(format!(
                        "THOUGHT: {}\nACTION: {}\nRESULT: {}",
                        action.thought, action_json, result
                    ));
                }
                Err(e) => {
                    tracing::error!("Failed to execute tool: {}", e);
                    push_log(&mut log, turn, LogEntryType::Error, &e.to_string());
                    transcript.push_assistant(format!(
                        "THOUGHT: {}\nACTION: {}\nERROR: {}",
                        action.thought, action_json, e
                    ));
                }
            }
        }

        tracing::error!("{}", TURN_LIMIT_MESSAGE);
        AgentRun {
            outcome: AgentOutcome::error(TURN_LIMIT_MESSAGE),
            turns: max_turns,
            log,
        }
    }
}

fn push_log(log: &mut Vec<TurnLogEntry>, turn: usize, entry_type: LogEntryType, content: &str) {
    log.push(TurnLogEntry {
        timestamp: Utc::now().to_rfc3339(),
        turn,
        entry_type,
        content: content.to_string(),
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... [truncated]", &s[..cut]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::llm::testing::ScriptedLlm;
    use crate::llm::Role;
    use crate::tools::testing::{FlakyTool, RecordingSleeper};

    struct Harness {
        llm: Arc<ScriptedLlm>,
        tool: Arc<FlakyTool>,
        sleeper: Arc<RecordingSleeper>,
        agent: Agent,
    }

    fn harness(llm: ScriptedLlm, tool: FlakyTool) -> Harness {
        harness_with(llm, tool, false)
    }

    fn harness_with(llm: ScriptedLlm, tool: FlakyTool, structured_output: bool) -> Harness {
        let llm = Arc::new(llm);
        let tool = Arc::new(tool);
        let sleeper = Arc::new(RecordingSleeper::default());

        let mut registry = ToolRegistry::new();
        registry.register(tool.clone());
        let executor = ToolExecutor::with_sleeper(
            registry,
            RetryPolicy::fixed(2, Duration::from_secs(1)),
            sleeper.clone(),
        );
        let agent = Agent::new(
            llm.clone(),
            executor,
            AgentSettings {
                model: "mistral".to_string(),
                max_turns: 10,
                structured_output,
                prompts_dir: PathBuf::from("/nonexistent"),
            },
        );

        Harness {
            llm,
            tool,
            sleeper,
            agent,
        }
    }

    fn final_answer_reply() -> String {
        format!(
            "THOUGHT: I have everything.\nFINAL ANSWER: {}",
            json!({"lyrics": "...", "vocabulary": []})
        )
    }

    #[tokio::test]
    async fn immediate_final_answer_ends_on_turn_one() {
        let h = harness(
            ScriptedLlm::new([r#"FINAL ANSWER: {"lyrics": "...", "vocabulary": []}"#]),
            FlakyTool::new("search_web_ddg", 0),
        );

        let run = h.agent.run("find lyrics for Yesterday by The Beatles").await;

        assert_eq!(run.turns, 1);
        assert_eq!(
            serde_json::to_value(&run.outcome).unwrap(),
            json!({"lyrics": "...", "vocabulary": []})
        );
        assert_eq!(h.llm.calls(), 1);
        assert_eq!(h.tool.calls(), 0);

        let first = &h.llm.requests()[0];
        assert_eq!(first[0].role, Role::System);
        assert_eq!(first[1].content, "find lyrics for Yesterday by The Beatles");
    }

    #[tokio::test]
    async fn stops_after_ten_turns_without_final_answer() {
        let h = harness(
            ScriptedLlm::new(Vec::<String>::new()),
            FlakyTool::new("search_web_ddg", 0),
        );

        let run = h.agent.run("find lyrics").await;

        assert_eq!(
            run.outcome,
            AgentOutcome::error("Reached maximum turns without completing the task")
        );
        assert_eq!(run.turns, 10);
        assert_eq!(h.llm.calls(), 10);
    }

    #[tokio::test]
    async fn malformed_actions_exhaust_turns() {
        let replies = vec!["THOUGHT: search\nACTION: {\"tool\": oops}"; 12];
        let h = harness(ScriptedLlm::new(replies), FlakyTool::new("search_web_ddg", 0));

        let outcome = h.agent.process_request("find lyrics").await;

        assert!(outcome.is_error());
        assert_eq!(h.llm.calls(), 10);
        assert_eq!(h.tool.calls(), 0);
    }

    #[tokio::test]
    async fn action_runs_tool_with_parsed_parameters() {
        let h = harness(
            ScriptedLlm::new([
                r#"THOUGHT: Search first.
ACTION: {"tool": "search_web_ddg", "tool_input": {"query": "Lemon 米津玄師", "max_results": 3}}"#
                    .to_string(),
                final_answer_reply(),
            ]),
            FlakyTool::new("search_web_ddg", 0),
        );

        let run = h.agent.run("find lyrics for Lemon").await;

        assert!(!run.outcome.is_error());
        assert_eq!(run.turns, 2);
        assert_eq!(
            *h.tool.seen_args.lock().unwrap(),
            vec![json!({"query": "Lemon 米津玄師", "max_results": 3})]
        );

        let second = &h.llm.requests()[1];
        assert_eq!(second.len(), 3);
        assert_eq!(second[2].role, Role::Assistant);
        assert!(second[2].content.starts_with("THOUGHT: Search first.\nACTION: "));
        assert!(second[2]
            .content
            .contains(r#"RESULT: {"echo":{"max_results":3,"query":"Lemon 米津玄師"}}"#));

        let kinds: Vec<_> = run.log.iter().map(|e| e.entry_type).collect();
        assert_eq!(
            kinds,
            vec![
                LogEntryType::Thinking,
                LogEntryType::ToolCall,
                LogEntryType::ToolResult,
                LogEntryType::Response
            ]
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_recorded_and_loop_advances() {
        let h = harness(
            ScriptedLlm::new([
                r#"THOUGHT: Try this.
ACTION: {"tool": "nonexistent_tool", "tool_input": {}}"#
                    .to_string(),
                final_answer_reply(),
            ]),
            FlakyTool::new("search_web_ddg", 0),
        );

        let run = h.agent.run("find lyrics").await;

        assert!(h.sleeper.recorded().is_empty());
        assert_eq!(h.llm.calls(), 2);
        assert_eq!(run.turns, 2);
        assert!(!run.outcome.is_error());

        let second = &h.llm.requests()[1];
        assert!(second[2]
            .content
            .ends_with("ERROR: Unknown tool: nonexistent_tool"));
    }

    #[tokio::test]
    async fn failing_tool_error_is_visible_to_model() {
        let h = harness(
            ScriptedLlm::new([
                r#"THOUGHT: Fetch it.
ACTION: {"tool": "get_page_content", "tool_input": {"url": "https://example.com"}}"#
                    .to_string(),
                final_answer_reply(),
            ]),
            FlakyTool::new("get_page_content", u32::MAX),
        );

        let run = h.agent.run("find lyrics").await;

        assert!(!run.outcome.is_error());
        assert_eq!(h.tool.calls(), 3);
        assert_eq!(h.sleeper.recorded().len(), 2);
        let second = &h.llm.requests()[1];
        assert!(second[2].content.ends_with("ERROR: failure #3"));
    }

    #[tokio::test]
    async fn model_error_becomes_error_outcome() {
        let h = harness(
            ScriptedLlm::failing("connection refused"),
            FlakyTool::new("search_web_ddg", 0),
        );

        let outcome = h.agent.process_request("find lyrics").await;

        assert_eq!(
            outcome,
            AgentOutcome::error(
                "Error in turn 1: model server returned an unreadable response: connection refused"
            )
        );
        assert_eq!(h.llm.calls(), 1);
    }

    #[tokio::test]
    async fn final_answer_preferred_over_action_in_same_turn() {
        let h = harness(
            ScriptedLlm::new([r#"THOUGHT: done
ACTION: {"tool": "search_web_ddg", "tool_input": {"query": "x"}}
FINAL ANSWER: {"title": "Lemon", "lyrics": "夢", "vocabulary": [{"word": "夢"}]}"#]),
            FlakyTool::new("search_web_ddg", 0),
        );

        let outcome = h.agent.process_request("find lyrics").await;

        match outcome {
            AgentOutcome::Final(answer) => {
                assert_eq!(answer.title(), Some("Lemon"));
                assert_eq!(answer.vocabulary.len(), 1);
            }
            other => panic!("expected final answer, got {other:?}"),
        }
        assert_eq!(h.tool.calls(), 0);
    }

    #[tokio::test]
    async fn structured_turns_drive_the_loop() {
        let h = harness_with(
            ScriptedLlm::new([
                json!({
                    "thought": "Search first.",
                    "action": {"tool": "search_web_ddg", "tool_input": {"query": "Lemon"}},
                    "final_answer": null
                })
                .to_string(),
                json!({
                    "thought": "Done.",
                    "final_answer": {"lyrics": "夢ならば", "vocabulary": [{"word": "夢"}]}
                })
                .to_string(),
            ]),
            FlakyTool::new("search_web_ddg", 0),
            true,
        );

        let run = h.agent.run("find lyrics for Lemon").await;

        assert!(!run.outcome.is_error());
        assert_eq!(run.turns, 2);
        assert_eq!(h.tool.calls(), 1);
        assert_eq!(
            *h.tool.seen_args.lock().unwrap(),
            vec![json!({"query": "Lemon"})]
        );
        assert_eq!(
            h.llm.formats(),
            vec![Some(structured_turn_schema()), Some(structured_turn_schema())]
        );
    }

    #[tokio::test]
    async fn plain_mode_sends_no_format() {
        let h = harness(
            ScriptedLlm::new([final_answer_reply()]),
            FlakyTool::new("search_web_ddg", 0),
        );

        h.agent.process_request("find lyrics").await;

        assert_eq!(h.llm.formats(), vec![None]);
    }

    struct PanickingTool;

    #[async_trait::async_trait]
    impl crate::tools::Tool for PanickingTool {
        fn name(&self) -> &str {
            "get_page_content"
        }

        fn description(&self) -> &str {
            "Always panics"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
            let pages: Vec<Value> = Vec::new();
            Ok(pages[0].clone())
        }
    }

    #[tokio::test]
    async fn panicking_tool_becomes_error_outcome() {
        let llm = Arc::new(ScriptedLlm::new([r#"THOUGHT: Fetch it.
ACTION: {"tool": "get_page_content", "tool_input": {"url": "https://example.com"}}"#]));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(PanickingTool));
        let agent = Agent::new(
            llm.clone(),
            ToolExecutor::with_sleeper(
                registry,
                RetryPolicy::default(),
                Arc::new(RecordingSleeper::default()),
            ),
            AgentSettings {
                model: "mistral".to_string(),
                max_turns: 10,
                structured_output: false,
                prompts_dir: PathBuf::from("/nonexistent"),
            },
        );

        let run = tokio::spawn(async move { agent.run("find lyrics").await })
            .await
            .expect("run completes without unwinding");

        assert_eq!(run.turns, 1);
        match &run.outcome {
            AgentOutcome::Error { error } => {
                assert!(error.starts_with("Error in turn 1: tool get_page_content panicked:"));
                assert!(error.contains("index out of bounds"));
            }
            other => panic!("expected error outcome, got {other:?}"),
        }
        assert_eq!(llm.calls(), 1);
        assert_eq!(run.log.last().map(|e| e.entry_type), Some(LogEntryType::Error));
    }

    #[test]
    fn log_truncation_is_char_safe() {
        assert_eq!(truncate_for_log("夢夢夢", 2), "夢夢... [truncated]");
        assert_eq!(truncate_for_log("short", 10), "short");
    }
}

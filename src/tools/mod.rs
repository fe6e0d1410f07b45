//! Tools the agent can call by name.
//!
//! Each tool takes keyword arguments as a JSON object and returns arbitrary
//! JSON. There is no common result envelope; the agent serializes whatever
//! comes back into the transcript.

mod executor;
mod page;
mod retry;
mod save;
mod search;
mod song_id;
mod vocabulary;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::LlmClient;
use crate::store::SharedResultStore;

#[cfg(test)]
pub(crate) use executor::testing;
pub use executor::{ToolError, ToolExecutor};
pub use page::{extract_text_from_html, GetPageContent};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use save::SaveResults;
pub use search::{SearchWebDdg, SearchWebSerp};
pub use song_id::{generate_song_id, GenerateSongId};
pub use vocabulary::{split_lyrics_into_chunks, ExtractVocabulary, ExtractedWord, WordPart};

/// A callable capability.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the keyword arguments.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value) -> anyhow::Result<Value>;
}

/// Name and description of a registered tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Everything the default tools need from the outside world.
#[derive(Clone)]
pub struct ToolContext {
    pub llm: Arc<dyn LlmClient>,
    pub model: String,
    pub store: SharedResultStore,
    pub http: reqwest::Client,
    pub serp_api_key: Option<String>,
    pub prompts_dir: PathBuf,
}

/// Name → tool lookup.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the lyrics search, extraction and persistence tools.
    pub fn with_defaults(ctx: ToolContext) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SearchWebSerp::new(
            ctx.http.clone(),
            ctx.serp_api_key.clone(),
        )));
        registry.register(Arc::new(SearchWebDdg::new(ctx.http.clone())));
        registry.register(Arc::new(GetPageContent::new(ctx.http.clone())));
        registry.register(Arc::new(ExtractVocabulary::new(
            Arc::clone(&ctx.llm),
            ctx.model.clone(),
            ctx.prompts_dir.clone(),
        )));
        registry.register(Arc::new(GenerateSongId));
        registry.register(Arc::new(SaveResults::new(Arc::clone(&ctx.store))));
        registry
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tools sorted by name.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        let mut tools: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Function-style schemas for every registered tool, sorted by name.
    pub fn get_tool_schemas(&self) -> Vec<Value> {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let tool = &self.tools[name];
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": tool.parameters_schema(),
                })
            })
            .collect()
    }
}

/// Read a required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    args[key]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing '{}' argument", key))
}

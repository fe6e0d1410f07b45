//! Named tool invocation with retry.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use super::ToolRegistry;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The last error after every attempt failed.
    #[error("{source}")]
    Failed {
        tool: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
}

pub struct ToolExecutor {
    registry: ToolRegistry,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, policy: RetryPolicy) -> Self {
        Self::with_sleeper(registry, policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(
        registry: ToolRegistry,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            registry,
            policy,
            sleeper,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run `tool_name` with `args`, retrying on error per the policy.
    pub async fn execute(&self, tool_name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        tracing::info!("Executing tool {} with args: {}", tool_name, args);

        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match tool.execute(args.clone()).await {
                Ok(result) => {
                    tracing::info!("Tool {} execution successful", tool_name);
                    return Ok(result);
                }
                Err(e) => {
                    tracing::warn!(
                        "Tool {} execution failed (attempt {}/{}): {}",
                        tool_name,
                        attempt,
                        max_attempts,
                        e
                    );
                    if !self.policy.should_retry(attempt) {
                        tracing::error!("Tool {} failed after {} attempts", tool_name, attempt);
                        return Err(ToolError::Failed {
                            tool: tool_name.to_string(),
                            attempts: attempt,
                            source: e,
                        });
                    }
                    self.sleeper.sleep(self.policy.delay_for(attempt)).await;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::tools::{Sleeper, Tool};

    /// Records requested sleeps without waiting.
    #[derive(Default)]
    pub struct RecordingSleeper {
        pub sleeps: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn recorded(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    /// Fails a fixed number of times, then echoes its arguments.
    pub struct FlakyTool {
        pub name: &'static str,
        pub failures_before_success: u32,
        pub calls: AtomicU32,
        pub seen_args: Mutex<Vec<Value>>,
    }

    impl FlakyTool {
        pub fn new(name: &'static str, failures_before_success: u32) -> Self {
            Self {
                name,
                failures_before_success,
                calls: AtomicU32::new(0),
                seen_args: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Test tool"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, args: Value) -> anyhow::Result<Value> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen_args.lock().unwrap().push(args.clone());
            if call <= self.failures_before_success {
                anyhow::bail!("failure #{}", call);
            }
            Ok(json!({"echo": args}))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::testing::{FlakyTool, RecordingSleeper};
    use super::*;

    fn executor_with(tool: Arc<FlakyTool>, sleeper: Arc<RecordingSleeper>) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(tool);
        ToolExecutor::with_sleeper(registry, RetryPolicy::default(), sleeper)
    }

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let tool = Arc::new(FlakyTool::new("flaky", 2));
        let sleeper = Arc::new(RecordingSleeper::default());
        let executor = executor_with(Arc::clone(&tool), Arc::clone(&sleeper));

        let result = executor
            .execute("flaky", json!({"query": "Lemon"}))
            .await
            .expect("third attempt succeeds");

        assert_eq!(result, json!({"echo": {"query": "Lemon"}}));
        assert_eq!(tool.calls(), 3);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_secs(1), Duration::from_secs(1)]
        );
    }

    #[tokio::test]
    async fn returns_last_error_after_three_attempts() {
        let tool = Arc::new(FlakyTool::new("broken", u32::MAX));
        let sleeper = Arc::new(RecordingSleeper::default());
        let executor = executor_with(Arc::clone(&tool), Arc::clone(&sleeper));

        let err = executor
            .execute("broken", json!({}))
            .await
            .expect_err("always fails");

        match err {
            ToolError::Failed {
                tool: name,
                attempts,
                source,
            } => {
                assert_eq!(name, "broken");
                assert_eq!(attempts, 3);
                assert_eq!(source.to_string(), "failure #3");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(tool.calls(), 3);
        assert_eq!(sleeper.recorded().len(), 2);
    }

    #[tokio::test]
    async fn unknown_tool_fails_without_waiting() {
        let tool = Arc::new(FlakyTool::new("flaky", 0));
        let sleeper = Arc::new(RecordingSleeper::default());
        let executor = executor_with(Arc::clone(&tool), Arc::clone(&sleeper));

        let err = executor
            .execute("nonexistent_tool", json!({}))
            .await
            .expect_err("unknown tool");

        assert!(matches!(err, ToolError::UnknownTool(ref name) if name == "nonexistent_tool"));
        assert_eq!(err.to_string(), "Unknown tool: nonexistent_tool");
        assert!(sleeper.recorded().is_empty());
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn passes_arguments_unchanged() {
        let tool = Arc::new(FlakyTool::new("echo", 0));
        let sleeper = Arc::new(RecordingSleeper::default());
        let executor = executor_with(Arc::clone(&tool), sleeper);

        let args = json!({"title": "Lemon", "artist": "Kenshi Yonezu", "language": "ja"});
        executor.execute("echo", args.clone()).await.expect("ok");

        assert_eq!(*tool.seen_args.lock().unwrap(), vec![args]);
    }
}

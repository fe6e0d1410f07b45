//! Configuration management for the song vocabulary service.
//!
//! Configuration can be set via environment variables (a `.env` file is
//! loaded first by the binary):
//! - `OLLAMA_URL` - Optional. Base URL of the chat model server. Defaults to `http://localhost:11434`.
//! - `DEFAULT_MODEL` - Optional. The chat model to use. Defaults to `mistral`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.
//! - `MAX_TURNS` - Optional. Maximum agent loop turns. Defaults to `10`.
//! - `TOOL_MAX_RETRIES` - Optional. Retries per tool call after the first attempt. Defaults to `2`.
//! - `TOOL_RETRY_DELAY_MS` - Optional. Delay between tool attempts. Defaults to `1000`.
//! - `TOOL_RETRY_JITTER_MS` - Optional. Upper bound of random extra delay. Defaults to `0`.
//! - `STRUCTURED_OUTPUT` - Optional. Ask the model for schema-shaped JSON turns. Defaults to `false`.
//! - `DATABASE_PATH` - Optional. SQLite file for results. Defaults to `vocabulary.db`.
//! - `PROMPTS_DIR` - Optional. Directory holding prompt overrides. Defaults to `prompts`.
//! - `SERP_API_KEY` - Optional. Enables the `search_web_serp` tool.
//! - `HTTP_TIMEOUT_SECS` - Optional. Timeout for outbound HTTP calls. Defaults to `30`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Retry settings for tool execution.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Fixed delay between attempts
    pub delay: Duration,

    /// Upper bound of random extra delay per attempt
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(1),
            jitter: Duration::ZERO,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat model server base URL
    pub ollama_url: String,

    /// Chat model identifier
    pub default_model: String,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum turns for the agent loop
    pub max_turns: usize,

    /// Tool retry settings
    pub retry: RetryConfig,

    /// Request schema-shaped JSON responses from the model
    pub structured_output: bool,

    /// SQLite database path
    pub database_path: PathBuf,

    /// Prompt template directory
    pub prompts_dir: PathBuf,

    /// SERP API key (search_web_serp returns nothing without it)
    pub serp_api_key: Option<String>,

    /// Outbound HTTP timeout
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric or boolean variable
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let ollama_url = std::env::var("OLLAMA_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| "mistral".to_string());

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = parse_env("PORT", 8000u16)?;
        let max_turns = parse_env("MAX_TURNS", 10usize)?;

        let retry = RetryConfig {
            max_retries: parse_env("TOOL_MAX_RETRIES", 2u32)?,
            delay: Duration::from_millis(parse_env("TOOL_RETRY_DELAY_MS", 1000u64)?),
            jitter: Duration::from_millis(parse_env("TOOL_RETRY_JITTER_MS", 0u64)?),
        };

        let structured_output = std::env::var("STRUCTURED_OUTPUT")
            .ok()
            .map(|v| {
                parse_bool(&v)
                    .map_err(|e| ConfigError::InvalidValue("STRUCTURED_OUTPUT".to_string(), e))
            })
            .transpose()?
            .unwrap_or(false);

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("vocabulary.db"));

        let prompts_dir = std::env::var("PROMPTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("prompts"));

        let serp_api_key = std::env::var("SERP_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let http_timeout = Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 30u64)?);

        Ok(Self {
            ollama_url,
            default_model,
            host,
            port,
            max_turns,
            retry,
            structured_output,
            database_path,
            prompts_dir,
            serp_api_key,
            http_timeout,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(ollama_url: String, default_model: String, database_path: PathBuf) -> Self {
        Self {
            ollama_url,
            default_model,
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_turns: 10,
            retry: RetryConfig::default(),
            structured_output: false,
            database_path,
            prompts_dir: PathBuf::from("prompts"),
            serp_api_key: None,
            http_timeout: Duration::from_secs(30),
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        other => Err(format!("expected boolean-like value, got: {}", other)),
    }
}

//! Chat model access.
//!
//! The agent only needs one capability from a model: take an ordered list of
//! role-tagged messages and return the assistant's reply text. `LlmClient`
//! is that seam; `OllamaClient` is the production implementation.

mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ollama::OllamaClient;

/// Message author role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    /// JSON schema the reply must follow, when the backend supports it.
    pub format: Option<serde_json::Value>,
}

/// Chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to model server failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model server returned an unreadable response: {0}")]
    InvalidResponse(String),
}

/// A chat-completion endpoint.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatResponse, LlmError>;
}

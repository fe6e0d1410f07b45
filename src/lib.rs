//! # Song Vocab
//!
//! A ReAct agent that finds song lyrics and builds a vocabulary list for
//! language learners.
//!
//! This library provides:
//! - An HTTP API that runs the agent and stores its answers
//! - A bounded turn loop over a chat model with named tools
//! - Lyrics search, page fetching, vocabulary extraction and persistence tools
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Receive a request via the API
//! 2. Build the system prompt from the instructions and the tool list
//! 3. Ask the model for a turn, parse it, run the requested tool with retries
//! 4. Feed the result back, repeat until a final answer or the turn limit
//!
//! ## Example
//!
//! ```rust,ignore
//! use song_vocab::{agent::Agent, config::Config, store::InMemoryResultStore};
//!
//! let config = Config::from_env()?;
//! let agent = Agent::from_config(&config, Arc::new(InMemoryResultStore::new()))?;
//! let outcome = agent.process_request("Find lyrics for Lemon by Kenshi Yonezu").await;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod models;
pub mod store;
pub mod tools;

pub use config::Config;

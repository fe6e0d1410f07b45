//! HTTP API for the lyrics agent.
//!
//! ## Endpoints
//!
//! - `POST /api/agent` - Run the agent on a request and store the answer
//! - `GET /api/songs/:song_id/vocabulary` - Stored vocabulary for a song
//! - `GET /api/health` - Health check

mod routes;
pub mod types;

pub use routes::{router, serve, AppState};

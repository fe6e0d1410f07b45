//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::models::VocabularyItem;

/// Request body for `POST /api/agent`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageRequest {
    /// Free-text request, e.g. "Find lyrics for Lemon by Kenshi Yonezu"
    pub message_request: String,
}

/// Successful agent reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    pub lyrics: String,
    pub vocabulary: Vec<VocabularyItem>,
}

/// Stored vocabulary for one song.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongVocabularyResponse {
    pub song_id: String,
    pub vocabulary: Vec<VocabularyItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether stored songs survive a restart
    pub persistent_store: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

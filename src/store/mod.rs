//! Persistence for songs and their vocabulary.
//!
//! The agent, the `save_results` tool and the HTTP layer all receive a
//! `SharedResultStore`; nothing reaches for a process-wide database handle.

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{SongRecord, VocabularyItem};

pub use memory::InMemoryResultStore;
pub use sqlite::SqliteResultStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("could not encode vocabulary metadata: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Whether data survives a restart.
    fn is_persistent(&self) -> bool;

    /// Create tables if needed.
    async fn init(&self) -> Result<(), StoreError>;

    /// Upsert lyrics and vocabulary under a generated song id. Last writer wins.
    async fn save_results(
        &self,
        song_id: &str,
        lyrics: &str,
        vocabulary: &[VocabularyItem],
    ) -> Result<(), StoreError>;

    /// Store a complete song with its vocabulary and return the song id.
    async fn add_song_and_vocabulary(
        &self,
        song: &SongRecord,
        vocabulary: &[VocabularyItem],
    ) -> Result<String, StoreError>;

    /// Vocabulary stored for a song, ordered by word.
    async fn get_song_vocabulary(&self, song_id: &str)
        -> Result<Vec<VocabularyItem>, StoreError>;

    async fn get_song(&self, song_id: &str) -> Result<Option<SongRecord>, StoreError>;
}

pub type SharedResultStore = Arc<dyn ResultStore>;

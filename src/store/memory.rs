//! In-memory result store (non-persistent).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ResultStore, StoreError};
use crate::models::{SongRecord, VocabularyItem};

#[derive(Clone, Default)]
pub struct InMemoryResultStore {
    songs: Arc<RwLock<HashMap<String, SongRecord>>>,
    vocabulary: Arc<RwLock<HashMap<String, Vec<VocabularyItem>>>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn song_count(&self) -> usize {
        self.songs.read().await.len()
    }
}

/// Replace entries with the same word, append the rest.
fn merge_vocabulary(existing: &mut Vec<VocabularyItem>, incoming: &[VocabularyItem]) {
    for item in incoming {
        match existing.iter_mut().find(|e| e.word == item.word) {
            Some(slot) => *slot = item.clone(),
            None => existing.push(item.clone()),
        }
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn init(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn save_results(
        &self,
        song_id: &str,
        lyrics: &str,
        vocabulary: &[VocabularyItem],
    ) -> Result<(), StoreError> {
        {
            let mut songs = self.songs.write().await;
            let song = songs
                .entry(song_id.to_string())
                .or_insert_with(|| SongRecord {
                    id: song_id.to_string(),
                    title: None,
                    artist: None,
                    lyrics: String::new(),
                    language: None,
                });
            song.lyrics = lyrics.to_string();
        }

        let mut all = self.vocabulary.write().await;
        merge_vocabulary(all.entry(song_id.to_string()).or_default(), vocabulary);
        Ok(())
    }

    async fn add_song_and_vocabulary(
        &self,
        song: &SongRecord,
        vocabulary: &[VocabularyItem],
    ) -> Result<String, StoreError> {
        self.songs
            .write()
            .await
            .insert(song.id.clone(), song.clone());

        let mut all = self.vocabulary.write().await;
        merge_vocabulary(all.entry(song.id.clone()).or_default(), vocabulary);
        Ok(song.id.clone())
    }

    async fn get_song_vocabulary(
        &self,
        song_id: &str,
    ) -> Result<Vec<VocabularyItem>, StoreError> {
        let mut items = self
            .vocabulary
            .read()
            .await
            .get(song_id)
            .cloned()
            .unwrap_or_default();
        items.sort_by(|a, b| a.word.cmp(&b.word));
        Ok(items)
    }

    async fn get_song(&self, song_id: &str) -> Result<Option<SongRecord>, StoreError> {
        Ok(self.songs.read().await.get(song_id).cloned())
    }
}

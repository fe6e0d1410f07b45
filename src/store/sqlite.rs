//! SQLite-backed result store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{ResultStore, StoreError};
use crate::models::{SongRecord, VocabularyItem};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS songs (
    id TEXT PRIMARY KEY,
    title TEXT,
    artist TEXT,
    lyrics TEXT NOT NULL,
    language TEXT,
    created_at TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vocabulary (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    song_id TEXT NOT NULL REFERENCES songs (id),
    word TEXT NOT NULL,
    reading TEXT,
    meaning TEXT,
    part_of_speech TEXT,
    difficulty_level TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    UNIQUE (song_id, word)
);
"#;

#[derive(Clone)]
pub struct SqliteResultStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteResultStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a blocking closure against the connection off the async runtime.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Task("connection mutex poisoned".to_string()))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn upsert_vocabulary(
    tx: &rusqlite::Transaction<'_>,
    song_id: &str,
    vocabulary: &[VocabularyItem],
    now: &str,
) -> Result<(), StoreError> {
    let mut stmt = tx.prepare(
        "INSERT OR REPLACE INTO vocabulary
            (song_id, word, reading, meaning, part_of_speech, difficulty_level, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for item in vocabulary {
        let metadata = serde_json::to_string(&item.extra)?;
        stmt.execute(params![
            song_id,
            item.word,
            item.reading,
            item.meaning,
            item.part_of_speech,
            item.difficulty_level,
            metadata,
            now,
        ])?;
    }
    Ok(())
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn init(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
    }

    async fn save_results(
        &self,
        song_id: &str,
        lyrics: &str,
        vocabulary: &[VocabularyItem],
    ) -> Result<(), StoreError> {
        let song_id = song_id.to_string();
        let lyrics = lyrics.to_string();
        let vocabulary = vocabulary.to_vec();

        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO songs (id, lyrics, created_at, last_updated)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(id) DO UPDATE SET lyrics = excluded.lyrics,
                                               last_updated = excluded.last_updated",
                params![song_id, lyrics, now],
            )?;
            upsert_vocabulary(&tx, &song_id, &vocabulary, &now)?;
            tx.commit()?;
            tracing::info!(
                "Saved song {} with {} vocabulary items",
                song_id,
                vocabulary.len()
            );
            Ok(())
        })
        .await
    }

    async fn add_song_and_vocabulary(
        &self,
        song: &SongRecord,
        vocabulary: &[VocabularyItem],
    ) -> Result<String, StoreError> {
        let song = song.clone();
        let vocabulary = vocabulary.to_vec();

        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO songs (id, title, artist, lyrics, language, created_at, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(id) DO UPDATE SET title = excluded.title,
                                               artist = excluded.artist,
                                               lyrics = excluded.lyrics,
                                               language = excluded.language,
                                               last_updated = excluded.last_updated",
                params![song.id, song.title, song.artist, song.lyrics, song.language, now],
            )?;
            upsert_vocabulary(&tx, &song.id, &vocabulary, &now)?;
            tx.commit()?;
            Ok(song.id)
        })
        .await
    }

    async fn get_song_vocabulary(
        &self,
        song_id: &str,
    ) -> Result<Vec<VocabularyItem>, StoreError> {
        let song_id = song_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT word, reading, meaning, part_of_speech, difficulty_level, metadata
                 FROM vocabulary WHERE song_id = ?1 ORDER BY word",
            )?;
            let rows = stmt.query_map(params![song_id], |row| {
                let metadata: Option<String> = row.get(5)?;
                Ok(VocabularyItem {
                    word: row.get(0)?,
                    reading: row.get(1)?,
                    meaning: row.get(2)?,
                    part_of_speech: row.get(3)?,
                    difficulty_level: row.get(4)?,
                    extra: metadata
                        .and_then(|raw| serde_json::from_str(&raw).ok())
                        .unwrap_or_default(),
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn get_song(&self, song_id: &str) -> Result<Option<SongRecord>, StoreError> {
        let song_id = song_id.to_string();
        self.with_conn(move |conn| {
            let song = conn
                .query_row(
                    "SELECT id, title, artist, lyrics, language FROM songs WHERE id = ?1",
                    params![song_id],
                    |row| {
                        Ok(SongRecord {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            artist: row.get(2)?,
                            lyrics: row.get(3)?,
                            language: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(song)
        })
        .await
    }
}

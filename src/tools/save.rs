//! Persist lyrics and vocabulary under a song id.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, Tool};
use crate::models::VocabularyItem;
use crate::store::SharedResultStore;

pub struct SaveResults {
    store: SharedResultStore,
}

impl SaveResults {
    pub fn new(store: SharedResultStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SaveResults {
    fn name(&self) -> &str {
        "save_results"
    }

    fn description(&self) -> &str {
        "Save lyrics and their vocabulary list under a song_id from generate_song_id. Returns true on success."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "song_id": {"type": "string", "description": "ID from generate_song_id"},
                "lyrics": {"type": "string", "description": "Complete lyrics text"},
                "vocabulary": {
                    "type": "array",
                    "description": "Vocabulary items",
                    "items": {
                        "type": "object",
                        "properties": {
                            "word": {"type": "string"},
                            "reading": {"type": "string"},
                            "meaning": {"type": "string"},
                            "part_of_speech": {"type": "string"},
                            "difficulty_level": {"type": "string"}
                        },
                        "required": ["word"]
                    }
                }
            },
            "required": ["song_id", "lyrics", "vocabulary"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let song_id = required_str(&args, "song_id")?;
        let lyrics = required_str(&args, "lyrics")?;
        let vocabulary: Vec<VocabularyItem> = serde_json::from_value(args["vocabulary"].clone())
            .map_err(|e| anyhow::anyhow!("Invalid 'vocabulary' argument: {}", e))?;

        match self.store.save_results(song_id, lyrics, &vocabulary).await {
            Ok(()) => Ok(Value::Bool(true)),
            Err(e) => {
                tracing::error!("Error saving results for {}: {}", song_id, e);
                Ok(Value::Bool(false))
            }
        }
    }
}

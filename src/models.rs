//! Song and vocabulary data shared by the agent, tools, store and API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A vocabulary entry presented to learners.
///
/// Keys beyond the named fields are kept in `extra` and stored as the
/// item's metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VocabularyItem {
    pub word: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meaning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VocabularyItem {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            reading: None,
            meaning: None,
            part_of_speech: None,
            difficulty_level: None,
            extra: Map::new(),
        }
    }
}

/// The payload that ends a successful agent run.
///
/// Keys beyond `lyrics` and `vocabulary` (typically `title` and `artist`)
/// are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalAnswer {
    pub lyrics: String,
    pub vocabulary: Vec<VocabularyItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FinalAnswer {
    pub fn title(&self) -> Option<&str> {
        self.extra.get("title").and_then(Value::as_str)
    }

    pub fn artist(&self) -> Option<&str> {
        self.extra.get("artist").and_then(Value::as_str)
    }
}

/// A stored song.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SongRecord {
    pub id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub lyrics: String,
    pub language: Option<String>,
}

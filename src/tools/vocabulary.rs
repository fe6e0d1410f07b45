//! Vocabulary extraction from lyrics using the chat model.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{required_str, Tool};
use crate::llm::{ChatMessage, ChatRequest, LlmClient};

const MAX_CHUNK_CHARS: usize = 500;
const PROMPT_FILE: &str = "extract_vocabulary.md";

const SYSTEM_PROMPT: &str = r#"You are a Japanese language expert that breaks down words into their components.
You MUST extract EVERY meaningful word from the lyrics, not just a sample.
ALWAYS follow these rules:
- Use EXACT field names: kanji, romaji, english, parts
- Break EVERY word into its proper parts
- Use actual Japanese characters in kanji field
- Each romaji array should contain ONE syllable
- Include ALL parts of the word
- Process EVERY word in the given text
- Ensure romaji is 100% accurate following Hepburn romanization"#;

const DEFAULT_TEMPLATE: &str = r#"Extract the vocabulary from the Japanese lyrics below.
Respond with a single JSON object of this shape and nothing else:
{"vocabulary": [{"kanji": "新しい", "romaji": "atarashii", "english": "new",
  "parts": [{"kanji": "新", "romaji": ["a", "ta", "ra"]}, {"kanji": "し", "romaji": ["shi"]}, {"kanji": "い", "romaji": ["i"]}]}]}"#;

/// A character group within a word and its syllables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WordPart {
    pub kanji: String,
    pub romaji: Vec<String>,
}

/// A word with its reading, meaning and breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedWord {
    pub kanji: String,
    pub romaji: String,
    pub english: String,
    pub parts: Vec<WordPart>,
}

#[derive(Deserialize)]
struct VocabularyResponse {
    vocabulary: Vec<ExtractedWord>,
}

/// Split lyrics into chunks of at most `max_chars` characters, cutting only
/// after `。`, `！`, `？` or a newline. A single sentence longer than
/// `max_chars` becomes its own chunk.
pub fn split_lyrics_into_chunks(lyrics: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in lyrics.split_inclusive(['。', '！', '？', '\n']) {
        let len = sentence.chars().count();
        if current_len + len <= max_chars {
            current.push_str(sentence);
            current_len += len;
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current.push_str(sentence);
            current_len = len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Parse the JSON object spanning the first `{` to the last `}`.
fn parse_vocabulary_reply(reply: &str) -> Option<Vec<ExtractedWord>> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<VocabularyResponse>(&reply[start..=end]) {
        Ok(parsed) => Some(parsed.vocabulary),
        Err(e) => {
            tracing::warn!("Error parsing vocabulary response: {}", e);
            None
        }
    }
}

/// Drop repeated (kanji, romaji, english) triples, keeping first occurrences.
fn dedupe(words: Vec<ExtractedWord>) -> Vec<ExtractedWord> {
    let mut seen = HashSet::new();
    words
        .into_iter()
        .filter(|w| seen.insert((w.kanji.clone(), w.romaji.clone(), w.english.clone())))
        .collect()
}

pub struct ExtractVocabulary {
    llm: Arc<dyn LlmClient>,
    model: String,
    prompts_dir: PathBuf,
}

impl ExtractVocabulary {
    pub fn new(llm: Arc<dyn LlmClient>, model: String, prompts_dir: PathBuf) -> Self {
        Self {
            llm,
            model,
            prompts_dir,
        }
    }

    async fn load_template(&self) -> String {
        let path = self.prompts_dir.join(PROMPT_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(template) => template,
            Err(e) => {
                tracing::debug!("Using built-in vocabulary prompt ({}: {})", path.display(), e);
                DEFAULT_TEMPLATE.to_string()
            }
        }
    }

    pub async fn extract(&self, lyrics: &str) -> anyhow::Result<Vec<ExtractedWord>> {
        let template = self.load_template().await;
        let mut all = Vec::new();

        for chunk in split_lyrics_into_chunks(lyrics, MAX_CHUNK_CHARS) {
            let messages = [
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!("{}\n\nLyrics:\n{}", template, chunk)),
            ];
            let reply = self
                .llm
                .chat(ChatRequest {
                    model: &self.model,
                    messages: &messages,
                    format: None,
                })
                .await?;

            if let Some(words) = parse_vocabulary_reply(&reply.content) {
                all.extend(words);
            }
        }

        Ok(dedupe(all))
    }
}

#[async_trait]
impl Tool for ExtractVocabulary {
    fn name(&self) -> &str {
        "extract_vocabulary"
    }

    fn description(&self) -> &str {
        "Extract every meaningful word from Japanese lyrics with its romaji, English meaning and a per-character breakdown."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "lyrics": {
                    "type": "string",
                    "description": "Full lyrics text"
                },
                "language": {
                    "type": "string",
                    "description": "Lyrics language (default: japanese)"
                }
            },
            "required": ["lyrics"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let lyrics = required_str(&args, "lyrics")?;
        let language = args["language"].as_str().unwrap_or("japanese");
        if !language.eq_ignore_ascii_case("japanese") && !language.eq_ignore_ascii_case("ja") {
            tracing::warn!("Vocabulary extraction is tuned for Japanese, got {}", language);
        }

        let words = self.extract(lyrics).await?;
        Ok(serde_json::to_value(words)?)
    }
}

//! Content-addressed song identifiers.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::{required_str, Tool};

/// Hex characters kept from the digest.
const ID_LEN: usize = 12;

fn non_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("static regex"))
}

/// Lowercase and drop everything that is not a word character or whitespace.
fn normalize(s: &str) -> String {
    non_word().replace_all(&s.to_lowercase(), "").into_owned()
}

/// 12 lowercase hex chars of SHA-256 over `title:artist[:language]`, normalized.
pub fn generate_song_id(title: &str, artist: &str, language: Option<&str>) -> String {
    let mut base = format!("{}:{}", normalize(title), normalize(artist));
    if let Some(language) = language.filter(|l| !l.is_empty()) {
        base.push(':');
        base.push_str(language);
    }

    let digest = Sha256::digest(base.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(ID_LEN);
    id
}

pub struct GenerateSongId;

#[async_trait]
impl Tool for GenerateSongId {
    fn name(&self) -> &str {
        "generate_song_id"
    }

    fn description(&self) -> &str {
        "Generate a stable 12-character ID for a song from its title, artist and optional language code. Use it as the song_id for save_results."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "description": "Song title"},
                "artist": {"type": "string", "description": "Artist name"},
                "language": {"type": "string", "description": "Optional language code, e.g. 'ja'"}
            },
            "required": ["title", "artist"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let title = required_str(&args, "title")?;
        let artist = required_str(&args, "artist")?;
        let language = args["language"].as_str();
        Ok(Value::String(generate_song_id(title, artist, language)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_and_twelve_hex_chars() {
        let a = generate_song_id("Song A", "Artist B", Some("ja"));
        let b = generate_song_id("Song A", "Artist B", Some("ja"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn each_input_changes_the_id() {
        let base = generate_song_id("Song A", "Artist B", Some("ja"));
        assert_ne!(base, generate_song_id("Song C", "Artist B", Some("ja")));
        assert_ne!(base, generate_song_id("Song A", "Artist C", Some("ja")));
        assert_ne!(base, generate_song_id("Song A", "Artist B", Some("en")));
        assert_ne!(base, generate_song_id("Song A", "Artist B", None));
    }

    #[test]
    fn case_and_punctuation_are_ignored() {
        assert_eq!(
            generate_song_id("Yesterday!", "The Beatles", None),
            generate_song_id("yesterday", "the beatles", None)
        );
        assert_eq!(
            generate_song_id("Lemon", "米津玄師", Some("ja")),
            generate_song_id("LEMON.", "米津玄師", Some("ja"))
        );
    }

    #[test]
    fn matches_known_digest_prefix() {
        let digest = hex::encode(Sha256::digest(b"song a:artist b:ja"));
        assert_eq!(generate_song_id("Song A", "Artist B", Some("ja")), &digest[..12]);
    }

    #[tokio::test]
    async fn tool_requires_title_and_artist() {
        let err = GenerateSongId
            .execute(json!({"title": "Lemon"}))
            .await
            .expect_err("artist missing");
        assert!(err.to_string().contains("artist"));

        let id = GenerateSongId
            .execute(json!({"title": "Lemon", "artist": "Kenshi Yonezu", "language": "ja"}))
            .await
            .expect("id");
        assert_eq!(
            id,
            Value::String(generate_song_id("Lemon", "Kenshi Yonezu", Some("ja")))
        );
    }
}

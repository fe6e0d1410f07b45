//! Web search tools for locating lyrics pages.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::{json, Value};

use super::{required_str, Tool};

const DEFAULT_MAX_RESULTS: usize = 5;
const SERP_ENDPOINT: &str = "https://serpapi.com/search";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; SongVocab/1.0)";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Append "lyrics" unless the query already asks for them.
fn lyrics_query(query: &str) -> String {
    if query.to_lowercase().contains("lyrics") {
        query.to_string()
    } else {
        format!("{} lyrics", query)
    }
}

fn search_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Search query, usually song title and artist"
            },
            "max_results": {
                "type": "integer",
                "description": "Maximum number of results to return (default: 5)"
            }
        },
        "required": ["query"]
    })
}

fn max_results(args: &Value) -> usize {
    args["max_results"]
        .as_u64()
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_MAX_RESULTS)
}

/// Search DuckDuckGo's HTML endpoint (no API key needed).
pub struct SearchWebDdg {
    client: reqwest::Client,
}

impl SearchWebDdg {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchResult>> {
        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(query)
        );
        let html = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(extract_ddg_results(&html, max_results))
    }
}

#[async_trait]
impl Tool for SearchWebDdg {
    fn name(&self) -> &str {
        "search_web_ddg"
    }

    fn description(&self) -> &str {
        "Search the web for song lyrics using DuckDuckGo. Returns a list of results with title, link and snippet."
    }

    fn parameters_schema(&self) -> Value {
        search_schema()
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let query = lyrics_query(required_str(&args, "query")?);
        let max_results = max_results(&args);

        let results = match self.search(&query, max_results).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("DuckDuckGo search failed for {:?}: {}", query, e);
                Vec::new()
            }
        };
        Ok(serde_json::to_value(results)?)
    }
}

/// Extract search results from DuckDuckGo HTML.
fn extract_ddg_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let (Ok(result_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse(".result"),
        Selector::parse(".result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut results = Vec::new();

    for element in document.select(&result_sel) {
        if results.len() >= max_results {
            break;
        }

        let Some(anchor) = element.select(&link_sel).next() else {
            continue;
        };
        let title = collapse_text(anchor.text());
        if title.is_empty() {
            continue;
        }

        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| collapse_text(el.text()))
            .unwrap_or_default();

        results.push(SearchResult {
            title,
            link: resolve_ddg_link(anchor.value().attr("href").unwrap_or("")),
            snippet,
        });
    }

    results
}

/// Join text nodes, collapsing runs of whitespace.
fn collapse_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unwrap DuckDuckGo redirect links (`//duckduckgo.com/l/?uddg=...`).
fn resolve_ddg_link(href: &str) -> String {
    if let Some(encoded) = href
        .split("uddg=")
        .nth(1)
        .and_then(|s| s.split('&').next())
    {
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    }
}

/// Search Google through SERP API, tuned for Japanese results.
pub struct SearchWebSerp {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl SearchWebSerp {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    async fn search(
        &self,
        api_key: &str,
        query: &str,
        max_results: usize,
    ) -> anyhow::Result<Vec<SearchResult>> {
        let num = max_results.to_string();
        let response = self
            .client
            .get(SERP_ENDPOINT)
            .query(&[
                ("api_key", api_key),
                ("engine", "google"),
                ("q", query),
                ("num", num.as_str()),
                ("gl", "jp"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("SERP API returned status code {}", status);
        }

        let data: Value = response.json().await?;
        Ok(parse_serp_results(&data, max_results))
    }
}

fn parse_serp_results(data: &Value, max_results: usize) -> Vec<SearchResult> {
    let field = |r: &Value, key: &str| r[key].as_str().unwrap_or("").to_string();
    data["organic_results"]
        .as_array()
        .map(|results| {
            results
                .iter()
                .take(max_results)
                .map(|r| SearchResult {
                    title: field(r, "title"),
                    link: field(r, "link"),
                    snippet: field(r, "snippet"),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Tool for SearchWebSerp {
    fn name(&self) -> &str {
        "search_web_serp"
    }

    fn description(&self) -> &str {
        "Search Google (via SERP API, Japan region) for song lyrics. Returns a list of results with title, link and snippet."
    }

    fn parameters_schema(&self) -> Value {
        search_schema()
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let query = lyrics_query(required_str(&args, "query")?);
        let max_results = max_results(&args);

        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("SERP API key not configured; search_web_serp returns no results");
            return Ok(json!([]));
        };

        let results = match self.search(api_key, &query, max_results).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!("SERP API search failed for {:?}: {}", query, e);
                Vec::new()
            }
        };
        Ok(serde_json::to_value(results)?)
    }
}

//! Page fetch tool: download a lyrics page and reduce it to text.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use serde_json::{json, Value};

use super::{required_str, Tool};

/// Elements whose content never contains lyrics.
const STRIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "header", "footer", "nav", "noscript", "template",
];

const MAX_CONTENT_CHARS: usize = 20_000;

pub struct GetPageContent {
    client: reqwest::Client,
}

impl GetPageContent {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &str) -> anyhow::Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP error: {}", status);
        }
        let body = response.text().await?;
        Ok(extract_text_from_html(&body))
    }
}

#[async_trait]
impl Tool for GetPageContent {
    fn name(&self) -> &str {
        "get_page_content"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its main text content with navigation, scripts and styles removed. Returns null if the page cannot be fetched."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let url = required_str(&args, "url")?;

        match self.fetch(url).await {
            Ok(text) => Ok(Value::String(truncate_chars(text, MAX_CONTENT_CHARS))),
            Err(e) => {
                tracing::warn!("Error fetching page content from {}: {}", url, e);
                Ok(Value::Null)
            }
        }
    }
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... [content truncated]", &text[..cut]),
        None => text,
    }
}

/// Extract readable text from HTML, skipping non-content elements.
pub fn extract_text_from_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let noise: Vec<Selector> = STRIPPED_ELEMENTS
        .iter()
        .filter_map(|tag| Selector::parse(tag).ok())
        .collect();

    let mut output = String::new();
    collect_text(&document.root_element(), &noise, &mut output);
    output.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: &ElementRef<'_>, noise: &[Selector], output: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                output.push_str(text);
                output.push(' ');
            }
            Node::Element(_) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                if noise.iter().any(|sel| sel.matches(&child_ref)) {
                    continue;
                }
                collect_text(&child_ref, noise, output);
            }
            _ => {}
        }
    }
}

//! Web search tool backed by the DuckDuckGo HTML endpoint

use crate::error::{Result, ToolError};
use crate::tools::{Tool, ToolCall, ToolExample, ToolResult};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::json;

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = concat!("research-agent/", env!("CARGO_PKG_VERSION"));

/// Text returned when a search yields nothing usable
pub const NO_SEARCH_RESULTS: &str = "No good DuckDuckGo Search Result was found";

/// A single search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Web search over DuckDuckGo
pub struct SearchTool {
    client: Client,
    endpoint: String,
    max_results: usize,
}

impl SearchTool {
    pub fn new(max_results: usize) -> Self {
        Self::with_endpoint(SEARCH_ENDPOINT, max_results)
    }

    /// Point the tool at a different endpoint, mostly useful for tests
    pub fn with_endpoint(endpoint: impl Into<String>, max_results: usize) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: endpoint.into(),
            max_results: max_results.max(1),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed {
                name: "web_search".to_string(),
                message: format!("search endpoint returned {}", status),
            }
            .into());
        }

        let html = response.text().await?;
        Ok(parse_results(&html, self.max_results))
    }
}

const RESULT_ANCHOR: &str = r#"class="result__a""#;
const TITLE_PATTERN: &str = r#"(?s)class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#;
const SNIPPET_PATTERN: &str = r#"(?s)class="result__snippet"[^>]*>(.*?)</a>"#;

/// Extract up to `limit` hits from a DuckDuckGo HTML results page
///
/// The page is cut into one block per result link, so a result without a
/// snippet never borrows the next result's snippet.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let (Ok(title_pattern), Ok(snippet_pattern), Ok(tags)) = (
        Regex::new(TITLE_PATTERN),
        Regex::new(SNIPPET_PATTERN),
        Regex::new(r"<[^>]+>"),
    ) else {
        return Vec::new();
    };

    let starts: Vec<usize> = html.match_indices(RESULT_ANCHOR).map(|(i, _)| i).collect();
    let blocks = starts.iter().enumerate().map(|(n, &start)| {
        let end = starts.get(n + 1).copied().unwrap_or(html.len());
        &html[start..end]
    });

    blocks
        .filter_map(|block| {
            let caps = title_pattern.captures(block)?;
            let title = clean_text(&tags, &caps[2]);
            if title.is_empty() {
                return None;
            }
            let snippet = snippet_pattern
                .captures(block)
                .map(|s| clean_text(&tags, &s[1]))
                .unwrap_or_default();
            Some(SearchHit {
                title,
                url: resolve_link(&caps[1]),
                snippet,
            })
        })
        .take(limit)
        .collect()
}

/// Render hits as a numbered list
pub fn format_results(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_SEARCH_RESULTS.to_string();
    }

    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "{}. {}\n   URL: {}\n   {}",
                i + 1,
                hit.title,
                hit.url,
                hit.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// DuckDuckGo wraps outbound links in a `/l/?uddg=<target>` redirect
fn resolve_link(href: &str) -> String {
    let href = decode_entities(href);
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href
    };

    match url::Url::parse(&absolute) {
        Ok(parsed) => parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, target)| target.into_owned())
            .unwrap_or(absolute),
        Err(_) => absolute,
    }
}

fn clean_text(tags: &Regex, fragment: &str) -> String {
    let stripped = tags.replace_all(fragment, "");
    decode_entities(stripped.trim())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for relevant information. Useful for questions about current events or the current state of a topic."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, call: ToolCall) -> Result<ToolResult> {
        let query = call.text_input("query")?;
        if query.trim().is_empty() {
            return Err(ToolError::InvalidParameters {
                message: "query must not be empty".to_string(),
            }
            .into());
        }

        tracing::info!("Searching the web for: {}", query);
        let hits = self.search(&query).await?;
        tracing::debug!("Web search returned {} results", hits.len());

        Ok(ToolResult::success(call.id, format_results(&hits))
            .with_data(json!({ "query": query, "result_count": hits.len() })))
    }

    fn examples(&self) -> Vec<ToolExample> {
        vec![ToolExample {
            description: "Look up recent news".to_string(),
            parameters: json!({"query": "latest fusion energy breakthrough"}),
            expected_result: "A numbered list of titles, links and snippets".to_string(),
        }]
    }
}

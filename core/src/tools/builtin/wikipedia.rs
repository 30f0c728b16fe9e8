//! Wikipedia lookup tool
//!
//! Runs a MediaWiki full-text search, then fetches the plain-text intro of
//! each hit. Output is a series of `Page:` / `Summary:` blocks capped at a
//! fixed number of characters.

use crate::error::{Result, ToolError};
use crate::tools::{Tool, ToolCall, ToolExample, ToolResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";
const USER_AGENT: &str = concat!("research-agent/", env!("CARGO_PKG_VERSION"));

/// Text returned when no page matched the query
pub const NO_WIKIPEDIA_RESULTS: &str = "No good Wikipedia Search Result was found";

/// A page title with its intro extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub title: String,
    pub extract: String,
}

pub struct WikipediaTool {
    client: Client,
    api_url: String,
    top_k: usize,
    max_chars: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: Vec<ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    title: String,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    missing: bool,
}

impl WikipediaTool {
    pub fn new(top_k: usize, max_chars: usize) -> Self {
        Self::with_api_url(WIKIPEDIA_API, top_k, max_chars)
    }

    pub fn with_api_url(api_url: impl Into<String>, top_k: usize, max_chars: usize) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_url: api_url.into(),
            top_k: top_k.max(1),
            max_chars,
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, params: &[(&str, &str)]) -> Result<T> {
        let response = self.client.get(&self.api_url).query(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed {
                name: "wikipedia".to_string(),
                message: format!("Wikipedia API returned {}", status),
            }
            .into());
        }

        Ok(response.json().await?)
    }

    async fn search_titles(&self, query: &str) -> Result<Vec<String>> {
        let limit = self.top_k.to_string();
        let response: SearchResponse = self
            .get_json(&[
                ("action", "query"),
                ("format", "json"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", &limit),
            ])
            .await?;

        Ok(response
            .query
            .map(|q| q.search.into_iter().map(|entry| entry.title).collect())
            .unwrap_or_default())
    }

    async fn fetch_summary(&self, title: &str) -> Result<Option<PageSummary>> {
        let response: ExtractResponse = self
            .get_json(&[
                ("action", "query"),
                ("format", "json"),
                ("formatversion", "2"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;

        Ok(response
            .query
            .and_then(|q| q.pages.into_iter().next())
            .filter(|page| !page.missing)
            .and_then(|page| {
                let extract = page.extract?.trim().to_string();
                (!extract.is_empty()).then_some(PageSummary {
                    title: page.title,
                    extract,
                })
            }))
    }

    /// Search and summarize, honoring the configured result and length caps
    pub async fn lookup(&self, query: &str) -> Result<String> {
        let titles = self.search_titles(query).await?;
        tracing::debug!("Wikipedia search matched {} pages", titles.len());

        let mut summaries = Vec::with_capacity(titles.len());
        for title in titles.iter().take(self.top_k) {
            if let Some(summary) = self.fetch_summary(title).await? {
                summaries.push(summary);
            }
        }

        Ok(format_summaries(&summaries, self.max_chars))
    }
}

/// Join page summaries into the tool's text output, truncated to `max_chars`
pub fn format_summaries(summaries: &[PageSummary], max_chars: usize) -> String {
    if summaries.is_empty() {
        return NO_WIKIPEDIA_RESULTS.to_string();
    }

    let joined = summaries
        .iter()
        .map(|s| format!("Page: {}\nSummary: {}", s.title, s.extract))
        .collect::<Vec<_>>()
        .join("\n\n");

    truncate_chars(&joined, max_chars)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn description(&self) -> &str {
        "Look up a topic on Wikipedia and return summaries of the best matching pages."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Topic or page title to look up"
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

        tracing::info!("Looking up on Wikipedia: {}", query);
        let content = self.lookup(&query).await?;
        Ok(ToolResult::success(call.id, content))
    }

    fn examples(&self) -> Vec<ToolExample> {
        vec![ToolExample {
            description: "Get background on a person".to_string(),
            parameters: json!({"query": "Ada Lovelace"}),
            expected_result: "Page: Ada Lovelace\nSummary: Augusta Ada King, Countess of Lovelace...".to_string(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::builtin::test_server::{query_param, CannedServer, Reply};

    fn summary(title: &str, extract: &str) -> PageSummary {
        PageSummary {
            title: title.to_string(),
            extract: extract.to_string(),
        }
    }

    #[test]
    fn test_format_summaries() {
        let text = format_summaries(
            &[
                summary("Rust (programming language)", "A systems language."),
                summary("Rust", "Iron oxide."),
            ],
            2000,
        );
        assert_eq!(
            text,
            "Page: Rust (programming language)\nSummary: A systems language.\n\nPage: Rust\nSummary: Iron oxide."
        );
    }

    #[test]
    fn test_format_summaries_truncates_on_char_boundary() {
        let text = format_summaries(&[summary("Zürich", "Größte Stadt der Schweiz")], 20);
        assert_eq!(text.chars().count(), 20);
        assert_eq!(text, "Page: Zürich\nSummary");
    }

    #[test]
    fn test_format_summaries_empty() {
        assert_eq!(format_summaries(&[], 2000), NO_WIKIPEDIA_RESULTS);
    }

    #[test]
    fn test_extract_response_parsing() {
        let raw = json!({
            "batchcomplete": true,
            "query": {
                "pages": [
                    {"pageid": 1, "ns": 0, "title": "Ada Lovelace", "extract": "English mathematician."}
                ]
            }
        });
        let parsed: ExtractResponse = serde_json::from_value(raw).unwrap();
        let page = parsed.query.unwrap().pages.into_iter().next().unwrap();
        assert_eq!(page.title, "Ada Lovelace");
        assert!(!page.missing);
        assert_eq!(page.extract.as_deref(), Some("English mathematician."));
    }

    /// Search answers with three titles whatever `srlimit` says
    fn wiki_reply(target: &str) -> Reply {
        let body = if query_param(target, "list").as_deref() == Some("search") {
            json!({"query": {"search": [
                {"title": "Rust (programming language)"},
                {"title": "Rust (fungus)"},
                {"title": "Rust"}
            ]}})
        } else {
            match query_param(target, "titles").as_deref() {
                Some("Rust (fungus)") => json!({"query": {"pages": [
                    {"title": "Rust (fungus)", "missing": true}
                ]}}),
                Some(title) => json!({"query": {"pages": [
                    {"title": title, "extract": format!("About {}.", title)}
                ]}}),
                None => json!({}),
            }
        };
        (200, "application/json", body.to_string())
    }

    #[tokio::test]
    async fn test_lookup_searches_then_fetches_extracts() {
        let server = CannedServer::start(wiki_reply).await;
        let tool = WikipediaTool::with_api_url(format!("{}/w/api.php", server.url), 3, 2000);

        let result = tool
            .execute(ToolCall::new("wikipedia", json!({"query": "rust language"})))
            .await
            .unwrap();

        assert_eq!(
            result.content,
            "Page: Rust (programming language)\nSummary: About Rust (programming language).\n\nPage: Rust\nSummary: About Rust."
        );

        let requests = server.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(query_param(&requests[0], "srsearch").as_deref(), Some("rust language"));
        assert_eq!(query_param(&requests[0], "srlimit").as_deref(), Some("3"));
        let fetched: Vec<_> = requests[1..]
            .iter()
            .map(|r| query_param(r, "titles").unwrap())
            .collect();
        assert_eq!(fetched, vec!["Rust (programming language)", "Rust (fungus)", "Rust"]);
        assert_eq!(query_param(&requests[1], "exintro").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_lookup_caps_pages_at_top_k() {
        let server = CannedServer::start(wiki_reply).await;
        let tool = WikipediaTool::with_api_url(server.url.clone(), 1, 2000);

        let content = tool.lookup("rust").await.unwrap();
        assert_eq!(
            content,
            "Page: Rust (programming language)\nSummary: About Rust (programming language)."
        );
        // one search plus one extract, the extra titles are never fetched
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_lookup_with_only_missing_pages() {
        let server = CannedServer::start(|target| {
            if query_param(target, "list").is_some() {
                let body = json!({"query": {"search": [{"title": "Rust (fungus)"}]}});
                (200, "application/json", body.to_string())
            } else {
                wiki_reply(target)
            }
        })
        .await;
        let tool = WikipediaTool::with_api_url(server.url.clone(), 3, 2000);

        assert_eq!(tool.lookup("fungus").await.unwrap(), NO_WIKIPEDIA_RESULTS);
    }

    #[tokio::test]
    async fn test_error_status_is_fatal() {
        let server =
            CannedServer::start(|_| (500, "text/plain", "server error".to_string())).await;
        let tool = WikipediaTool::with_api_url(server.url.clone(), 3, 2000);

        let err = tool
            .execute(ToolCall::new("wikipedia", json!({"query": "rust"})))
            .await
            .unwrap_err();
        assert!(!err.is_recoverable_tool_error());
        assert!(err.to_string().contains("Wikipedia API returned 500"));
    }

    #[test]
    fn test_search_response_without_query() {
        let parsed: SearchResponse = serde_json::from_value(json!({"batchcomplete": ""})).unwrap();
        assert!(parsed.query.is_none());
    }
}

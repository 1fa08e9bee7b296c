//! Web search adapter (Tavily)

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::registry::ToolDefinition;
use super::{http_client, str_arg, ToolAdapter, ToolOutput};

const SEARCH_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS: usize = 5;

/// Web search via the Tavily API
pub struct WebSearchTool {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl WebSearchTool {
    pub fn new(api_key: Option<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key,
            endpoint: SEARCH_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_endpoint(api_key: Option<String>, timeout_secs: u64, endpoint: String) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key,
            endpoint,
        }
    }
}

/// Tavily search response
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    url: Option<String>,
    title: Option<String>,
    content: Option<String>,
}

#[async_trait::async_trait]
impl ToolAdapter for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn citation_prefix(&self) -> &'static str {
        "web"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Search the web for information about a person, institution, or \
                          organization. Returns page titles, URLs, and content snippets."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> ToolOutput {
        let Some(query) = str_arg(args, "query") else {
            return ToolOutput::empty("no_queries", "No search query provided");
        };

        let Some(api_key) = self.api_key.as_deref() else {
            return ToolOutput::error("Web search is not configured (missing TAVILY_API_KEY)");
        };

        tracing::debug!(query = %query, "Running web search");

        let body = json!({
            "api_key": api_key,
            "query": query,
            "max_results": MAX_RESULTS,
        });

        let response = match self.client.post(&self.endpoint).json(&body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Web search request failed");
                return ToolOutput::error(format!("Web search request failed: {}", e));
            }
        };

        if !response.status().is_success() {
            return ToolOutput::error(format!("Web search returned HTTP {}", response.status()));
        }

        let parsed: SearchResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return ToolOutput::error(format!("Failed to parse web search response: {}", e));
            }
        };

        if parsed.results.is_empty() {
            return ToolOutput::empty("no_matches", format!("No web results for '{}'", query));
        }

        let items: Vec<Value> = parsed
            .results
            .into_iter()
            .take(MAX_RESULTS)
            .map(|r| {
                json!({
                    "url": r.url.unwrap_or_default(),
                    "title": r.title.unwrap_or_default(),
                    "content": r.content.unwrap_or_default(),
                })
            })
            .collect();

        let mut metadata = Map::new();
        metadata.insert("status".to_string(), json!("matches_found"));
        metadata.insert("query".to_string(), json!(query));
        metadata.insert("count".to_string(), json!(items.len()));

        ToolOutput::new(items, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_query_yields_empty_status() {
        let tool = WebSearchTool::new(Some("key".to_string()), 30);
        let output = tool.execute(&json!({})).await;
        assert!(output.items.is_empty());
        assert_eq!(output.metadata["status"], "no_queries");
    }

    #[tokio::test]
    async fn missing_key_is_in_band_error() {
        let tool = WebSearchTool::new(None, 30);
        let output = tool.execute(&json!({"query": "acme labs"})).await;
        assert!(output.is_error());
    }

    #[tokio::test]
    async fn hung_upstream_times_out_in_band() {
        // Bound but never accepted: the TCP handshake completes via the
        // listen backlog and the request then hangs with no response
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());

        let tool = WebSearchTool::with_endpoint(Some("key".to_string()), 1, endpoint);
        let start = std::time::Instant::now();
        let output = tool.execute(&json!({"query": "acme"})).await;

        assert!(output.items.is_empty());
        assert!(output.is_error());
        assert!(start.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    #[ignore] // Requires network access and TAVILY_API_KEY
    async fn live_search() {
        let key = std::env::var("TAVILY_API_KEY").ok();
        let tool = WebSearchTool::new(key, 30);
        let output = tool.execute(&json!({"query": "Broad Institute"})).await;
        assert!(!output.items.is_empty());
    }
}

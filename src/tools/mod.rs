//! Research tool adapters
//!
//! Each adapter wraps one external data source and normalizes it into the
//! uniform [`ToolOutput`] shape. Adapters never fail for "no data found":
//! transport and parsing failures are reported in-band through
//! `metadata.error` / `metadata.message` so the completion loop can keep
//! going when a single upstream degrades.

mod article_search;
mod registry;
mod researcher_profile;
mod screening_list;
mod web_search;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub use article_search::ArticleSearchTool;
pub use registry::{ToolDefinition, ToolRegistry};
pub use researcher_profile::{ResearcherProfileTool, ResearcherWorksTool};
pub use screening_list::ScreeningListTool;
pub use web_search::WebSearchTool;

/// Uniform result shape produced by every adapter
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ToolOutput {
    /// Flat, LLM-friendly records
    pub items: Vec<Value>,
    /// Status, counts, and error markers
    pub metadata: Map<String, Value>,
}

impl ToolOutput {
    pub fn new(items: Vec<Value>, metadata: Map<String, Value>) -> Self {
        Self { items, metadata }
    }

    /// Empty output with an explanatory status
    pub fn empty(status: &str, message: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("status".to_string(), json!(status));
        metadata.insert("message".to_string(), json!(message.into()));
        Self {
            items: Vec::new(),
            metadata,
        }
    }

    /// Empty output marking a transport or parsing failure
    pub fn error(message: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("error".to_string(), json!(true));
        metadata.insert("message".to_string(), json!(message.into()));
        Self {
            items: Vec::new(),
            metadata,
        }
    }

    pub fn is_error(&self) -> bool {
        self.metadata
            .get("error")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Trait for research tool adapters
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Registry name the LLM calls this tool by
    fn name(&self) -> &'static str;

    /// Short prefix used for citation IDs (e.g. `web`, `screen`)
    fn citation_prefix(&self) -> &'static str;

    /// LLM-facing function-call schema
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Must not fail: degraded results are reported in-band.
    async fn execute(&self, args: &Value) -> ToolOutput;
}

/// Build an HTTP client with the adapter-wide hard timeout
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

/// Truncate to at most `max` characters on a char boundary
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Read a string argument, treating missing and empty as absent
pub(crate) fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

//! Tool registry: name-based dispatch and LLM function schemas

use std::env;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::{
    ArticleSearchTool, ResearcherProfileTool, ResearcherWorksTool, ScreeningListTool,
    ToolAdapter, ToolOutput, WebSearchTool,
};
use crate::model::ToolConfig;

const ENV_TAVILY_API_KEY: &str = "TAVILY_API_KEY";
const ENV_TRADE_GOV_API_KEY: &str = "TRADE_GOV_API_KEY";

/// LLM-facing function-call schema for one tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-schema parameter object
    pub parameters: Value,
}

/// Registry of research tools, dispatched by name
pub struct ToolRegistry {
    adapters: Vec<Arc<dyn ToolAdapter>>,
}

impl ToolRegistry {
    pub fn new(adapters: Vec<Arc<dyn ToolAdapter>>) -> Self {
        Self { adapters }
    }

    /// Build the standard four-tool registry, reading provider credentials
    /// from the environment
    pub fn with_default_tools(config: &ToolConfig) -> Self {
        let tavily_key = env::var(ENV_TAVILY_API_KEY).ok();
        let trade_gov_key = env::var(ENV_TRADE_GOV_API_KEY).ok();

        if tavily_key.is_none() {
            tracing::warn!("TAVILY_API_KEY not set, web search will report errors");
        }
        if trade_gov_key.is_none() {
            tracing::warn!("TRADE_GOV_API_KEY not set, screening list will report errors");
        }

        let timeout = config.timeout_secs;
        Self::new(vec![
            Arc::new(WebSearchTool::new(tavily_key, timeout)),
            Arc::new(ScreeningListTool::new(trade_gov_key, timeout)),
            Arc::new(ArticleSearchTool::new(
                timeout,
                config.article_lite_results,
                config.article_full_results,
            )),
            Arc::new(ResearcherProfileTool::new(timeout, config.profile_max_works)),
            Arc::new(ResearcherWorksTool::new(timeout, config.profile_max_works)),
        ])
    }

    fn find(&self, name: &str) -> Option<&Arc<dyn ToolAdapter>> {
        self.adapters.iter().find(|a| a.name() == name)
    }

    /// Function-call schemas, optionally filtered to the given names
    pub fn tool_definitions(&self, names: Option<&[&str]>) -> Vec<ToolDefinition> {
        self.adapters
            .iter()
            .filter(|a| names.map(|ns| ns.contains(&a.name())).unwrap_or(true))
            .map(|a| a.definition())
            .collect()
    }

    /// Citation prefix for a tool, or a generic fallback for unknown names
    pub fn citation_prefix(&self, name: &str) -> &'static str {
        self.find(name).map(|a| a.citation_prefix()).unwrap_or("tool")
    }

    /// Dispatch a call by name. Arguments are sanitized first; an unknown
    /// tool name yields an error-shaped output, not a failure.
    pub async fn execute(&self, name: &str, args: &Value) -> ToolOutput {
        let args = sanitize_args(args);

        let Some(adapter) = self.find(name) else {
            tracing::warn!(tool = %name, "Model requested unknown tool");
            return ToolOutput::error(format!("Unknown tool: {}", name));
        };

        let start = std::time::Instant::now();
        let output = adapter.execute(&args).await;
        tracing::debug!(
            tool = %name,
            elapsed_ms = start.elapsed().as_millis(),
            items = output.items.len(),
            error = output.is_error(),
            "Tool executed"
        );
        output
    }
}

/// Drop null, empty-string, and empty-array arguments before dispatch
fn sanitize_args(args: &Value) -> Value {
    match args {
        Value::Object(map) => {
            let cleaned: serde_json::Map<String, Value> = map
                .iter()
                .filter(|(_, v)| match v {
                    Value::Null => false,
                    Value::String(s) => !s.trim().is_empty(),
                    Value::Array(a) => !a.is_empty(),
                    _ => true,
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(cleaned)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait::async_trait]
    impl ToolAdapter for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn citation_prefix(&self) -> &'static str {
            "echo"
        }
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".to_string(),
                description: "echoes".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            }
        }
        async fn execute(&self, args: &Value) -> ToolOutput {
            ToolOutput::new(vec![args.clone()], Default::default())
        }
    }

    #[test]
    fn sanitize_drops_empty_arguments() {
        let cleaned = sanitize_args(&json!({
            "query": "acme",
            "empty": "",
            "blank": "   ",
            "none": null,
            "list": [],
            "kept_list": ["a"],
            "count": 0,
        }));
        let map = cleaned.as_object().unwrap();
        assert!(map.contains_key("query"));
        assert!(map.contains_key("kept_list"));
        assert!(map.contains_key("count"));
        assert!(!map.contains_key("empty"));
        assert!(!map.contains_key("blank"));
        assert!(!map.contains_key("none"));
        assert!(!map.contains_key("list"));
    }

    #[tokio::test]
    async fn unknown_tool_returns_error_output() {
        let registry = ToolRegistry::new(vec![Arc::new(EchoTool)]);
        let output = registry.execute("nope", &json!({})).await;
        assert!(output.is_error());
        assert!(output.metadata["message"]
            .as_str()
            .unwrap()
            .contains("Unknown tool"));
    }

    #[tokio::test]
    async fn dispatch_sanitizes_before_execution() {
        let registry = ToolRegistry::new(vec![Arc::new(EchoTool)]);
        let output = registry
            .execute("echo", &json!({"keep": "x", "drop": null}))
            .await;
        let echoed = output.items[0].as_object().unwrap();
        assert!(echoed.contains_key("keep"));
        assert!(!echoed.contains_key("drop"));
    }

    #[test]
    fn definitions_filter_by_name() {
        let registry = ToolRegistry::new(vec![Arc::new(EchoTool)]);
        assert_eq!(registry.tool_definitions(None).len(), 1);
        assert_eq!(registry.tool_definitions(Some(&["echo"])).len(), 1);
        assert_eq!(registry.tool_definitions(Some(&["other"])).len(), 0);
    }

    #[test]
    fn unknown_prefix_falls_back() {
        let registry = ToolRegistry::new(vec![Arc::new(EchoTool)]);
        assert_eq!(registry.citation_prefix("echo"), "echo");
        assert_eq!(registry.citation_prefix("nope"), "tool");
    }
}

//! Denied-party screening adapter (trade.gov Consolidated Screening List)

use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::registry::ToolDefinition;
use super::{http_client, ToolAdapter, ToolOutput};

const SEARCH_URL: &str = "https://data.trade.gov/consolidated_screening_list/v1/search";

/// Fuzzy name search against the US Consolidated Screening List
pub struct ScreeningListTool {
    client: Client,
    api_key: Option<String>,
}

impl ScreeningListTool {
    pub fn new(api_key: Option<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key,
        }
    }

    /// Pull the list of name queries out of the arguments
    fn name_queries(args: &Value) -> Vec<String> {
        args.get("names")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn search_one(&self, api_key: &str, name: &str) -> Result<Vec<CslEntry>, String> {
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[("name", name), ("fuzzy_name", "true")])
            .header("subscription-key", api_key)
            .send()
            .await
            .map_err(|e| format!("Screening list request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!(
                "Screening list returned HTTP {}",
                response.status()
            ));
        }

        let parsed: CslResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse screening list response: {}", e))?;

        Ok(parsed.results)
    }
}

/// Consolidated Screening List search response
#[derive(Debug, Deserialize)]
struct CslResponse {
    #[serde(default)]
    results: Vec<CslEntry>,
}

#[derive(Debug, Deserialize)]
struct CslEntry {
    name: Option<String>,
    #[serde(default)]
    programs: Vec<String>,
    source: Option<String>,
}

#[async_trait::async_trait]
impl ToolAdapter for ScreeningListTool {
    fn name(&self) -> &'static str {
        "screening_list_search"
    }

    fn citation_prefix(&self) -> &'static str {
        "screen"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Check names of people and organizations against the US Consolidated \
                          Screening List (sanctions and export-control denied parties). Uses \
                          fuzzy matching; pass every name variant worth checking."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "names": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Person or organization names to screen"
                    }
                },
                "required": ["names"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> ToolOutput {
        let names = Self::name_queries(args);
        if names.is_empty() {
            return ToolOutput::empty("no_queries", "No names provided for screening");
        }

        let Some(api_key) = self.api_key.as_deref() else {
            return ToolOutput::error(
                "Screening list is not configured (missing TRADE_GOV_API_KEY)",
            );
        };

        tracing::debug!(names = ?names, "Running screening list search");

        // Name queries are independent; run them concurrently
        let results = join_all(names.iter().map(|name| self.search_one(api_key, name))).await;

        let mut matches: Vec<CslEntry> = Vec::new();
        let mut failures: Vec<String> = Vec::new();
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(entries) => matches.extend(entries),
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "Screening list query failed");
                    failures.push(e);
                }
            }
        }

        // Every query failed: surface the transport problem in-band
        if matches.is_empty() && failures.len() == names.len() && !names.is_empty() {
            return ToolOutput::error(failures.join("; "));
        }

        // Deduplicate by matched name
        let mut seen = std::collections::HashSet::new();
        let items: Vec<Value> = matches
            .into_iter()
            .filter_map(|entry| {
                let name = entry.name?;
                if !seen.insert(name.to_lowercase()) {
                    return None;
                }
                Some(json!({
                    "name": name,
                    "programs": entry.programs,
                    "source": entry.source.unwrap_or_default(),
                }))
            })
            .collect();

        let mut metadata = Map::new();
        metadata.insert("queried_names".to_string(), json!(names));
        if items.is_empty() {
            metadata.insert("status".to_string(), json!("no_matches"));
            metadata.insert(
                "message".to_string(),
                json!("No screening list matches for the queried names"),
            );
        } else {
            metadata.insert("status".to_string(), json!("matches_found"));
            metadata.insert("count".to_string(), json!(items.len()));
        }

        ToolOutput::new(items, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_name_list_is_no_queries() {
        let tool = ScreeningListTool::new(Some("key".to_string()), 30);
        let output = tool.execute(&json!({"names": []})).await;
        assert_eq!(output.metadata["status"], "no_queries");
    }

    #[test]
    fn name_queries_drops_blank_entries() {
        let names = ScreeningListTool::name_queries(&json!({"names": ["Acme", " ", "Acme Corp"]}));
        assert_eq!(names, vec!["Acme", "Acme Corp"]);
    }

    #[tokio::test]
    #[ignore] // Requires network access and TRADE_GOV_API_KEY
    async fn live_screening() {
        let key = std::env::var("TRADE_GOV_API_KEY").ok();
        let tool = ScreeningListTool::new(key, 30);
        let output = tool.execute(&json!({"names": ["Rosoboronexport"]})).await;
        assert_eq!(output.metadata["status"], "matches_found");
    }
}

//! Citation ID bookkeeping
//!
//! Every tool result shown to the model carries a short citation ID
//! (`web1`, `screen2`, ...) so narrative text can reference it traceably.
//! IDs are minted from a per-run counter table shared across both tool
//! loops of a run, which keeps them unique for the whole audit trail.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::model::NormalizedToolCall;
use crate::service::llm::RawToolCall;
use crate::tools::ToolOutput;

/// Per-run citation counters, keyed by tool prefix.
///
/// Owned by a single run and threaded by `&mut`; never shared across
/// concurrent runs.
#[derive(Debug, Default)]
pub struct IdCounters {
    counters: HashMap<String, u64>,
}

impl IdCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next ID for a prefix: `web1`, `web2`, ...
    pub fn next_id(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        format!("{}{}", prefix, counter)
    }
}

/// A tool output annotated for the model's context window
#[derive(Debug, Clone)]
pub struct AnnotatedOutput {
    /// JSON text injected into the conversation
    pub model_output: String,
    /// Citation ID of the last result (or of the empty-result marker)
    pub last_id: String,
    /// Number of result items
    pub count: usize,
}

/// Assign citation IDs to a tool output and render the JSON shown to the
/// model. A zero-item output still consumes one ID so the model can cite
/// the "no results" condition explicitly.
pub fn annotate_output(
    prefix: &str,
    output: &ToolOutput,
    counters: &mut IdCounters,
) -> AnnotatedOutput {
    if output.items.is_empty() {
        let id = counters.next_id(prefix);
        let payload = json!({
            "id": id,
            "metadata": output.metadata,
        });
        return AnnotatedOutput {
            model_output: payload.to_string(),
            last_id: id,
            count: 0,
        };
    }

    let mut results = Vec::with_capacity(output.items.len());
    let mut last_id = String::new();
    for item in &output.items {
        let id = counters.next_id(prefix);
        let mut entry = match item {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        entry.insert("id".to_string(), json!(id));
        last_id = id;
        results.push(Value::Object(entry));
    }

    let payload = json!({
        "results": results,
        "metadata": output.metadata,
    });

    AnnotatedOutput {
        model_output: payload.to_string(),
        last_id,
        count: output.items.len(),
    }
}

/// Parse a `model_output` back into `(last_id, count)` for telemetry.
/// Malformed JSON is downgraded to an empty ID and zero count.
pub fn parse_result_summary(model_output: &str) -> (String, usize) {
    let Ok(parsed) = serde_json::from_str::<Value>(model_output) else {
        return (String::new(), 0);
    };

    if let Some(results) = parsed.get("results").and_then(Value::as_array) {
        let last_id = results
            .last()
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return (last_id, results.len());
    }

    let id = parsed
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    (id, 0)
}

/// Best-effort query string for the audit trail, from the call arguments
fn derive_query(arguments: &Value) -> String {
    for key in ["query", "topic", "author", "orcid", "keyword", "affiliation"] {
        if let Some(value) = arguments.get(key).and_then(Value::as_str) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    if let Some(names) = arguments.get("names").and_then(Value::as_array) {
        let joined: Vec<&str> = names.iter().filter_map(Value::as_str).collect();
        if !joined.is_empty() {
            return joined.join(", ");
        }
    }
    String::new()
}

/// Re-derive flat audit records from the raw tool-call log.
///
/// Intentionally decoupled from the live citation IDs: this pass reads them
/// back out of `model_output`, so audit formatting can change without
/// touching the citation contract the model sees.
pub fn normalize_tool_calls(raw_calls: &[RawToolCall]) -> Vec<NormalizedToolCall> {
    let mut normalized = Vec::new();

    for call in raw_calls {
        let query = derive_query(&call.arguments);

        let Ok(parsed) = serde_json::from_str::<Value>(&call.model_output) else {
            tracing::debug!(tool = %call.tool_name, "Unparseable model output in audit pass");
            normalized.push(NormalizedToolCall {
                tool: call.tool_name.clone(),
                query,
                ..Default::default()
            });
            continue;
        };

        match parsed.get("results").and_then(Value::as_array) {
            Some(results) => {
                let count = results.len();
                for result in results {
                    normalized.push(NormalizedToolCall {
                        tool: call.tool_name.clone(),
                        query: query.clone(),
                        id: result
                            .get("id")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        title: result
                            .get("title")
                            .or_else(|| result.get("name"))
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        url: result.get("url").and_then(Value::as_str).map(str::to_string),
                        result_count: count,
                    });
                }
            }
            None => {
                normalized.push(NormalizedToolCall {
                    tool: call.tool_name.clone(),
                    query,
                    id: parsed.get("id").and_then(Value::as_str).map(str::to_string),
                    title: None,
                    url: None,
                    result_count: 0,
                });
            }
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn output_with_items(n: usize) -> ToolOutput {
        let items = (0..n)
            .map(|i| json!({"title": format!("result {}", i), "url": "https://example.com"}))
            .collect();
        ToolOutput::new(items, Map::new())
    }

    #[test]
    fn ids_are_monotonic_per_prefix_across_batches() {
        let mut counters = IdCounters::new();

        let first = annotate_output("web", &output_with_items(2), &mut counters);
        assert_eq!(first.last_id, "web2");

        // Second batch in the same run continues the sequence
        let second = annotate_output("web", &output_with_items(1), &mut counters);
        assert_eq!(second.last_id, "web3");

        // Other prefixes count independently
        let screen = annotate_output("screen", &output_with_items(1), &mut counters);
        assert_eq!(screen.last_id, "screen1");
    }

    #[test]
    fn empty_output_still_consumes_one_id() {
        let mut counters = IdCounters::new();
        let empty = ToolOutput::empty("no_matches", "nothing found");

        let annotated = annotate_output("screen", &empty, &mut counters);
        assert_eq!(annotated.last_id, "screen1");
        assert_eq!(annotated.count, 0);

        let parsed: Value = serde_json::from_str(&annotated.model_output).unwrap();
        assert_eq!(parsed["id"], "screen1");

        // The counter advanced past the empty result
        assert_eq!(counters.next_id("screen"), "screen2");
    }

    #[test]
    fn model_output_carries_per_result_ids() {
        let mut counters = IdCounters::new();
        let annotated = annotate_output("epmc", &output_with_items(3), &mut counters);

        let parsed: Value = serde_json::from_str(&annotated.model_output).unwrap();
        let results = parsed["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["id"], "epmc1");
        assert_eq!(results[2]["id"], "epmc3");
    }

    #[test]
    fn result_summary_tolerates_malformed_json() {
        assert_eq!(parse_result_summary("not json"), (String::new(), 0));
        assert_eq!(
            parse_result_summary(r#"{"id":"web1","metadata":{}}"#),
            ("web1".to_string(), 0)
        );
        assert_eq!(
            parse_result_summary(r#"{"results":[{"id":"web1"},{"id":"web2"}]}"#),
            ("web2".to_string(), 2)
        );
    }

    #[test]
    fn normalize_flattens_results_and_tolerates_garbage() {
        let mut counters = IdCounters::new();
        let annotated = annotate_output("web", &output_with_items(2), &mut counters);

        let calls = vec![
            RawToolCall {
                tool_name: "web_search".to_string(),
                arguments: json!({"query": "acme labs"}),
                output: output_with_items(2),
                model_output: annotated.model_output,
            },
            RawToolCall {
                tool_name: "broken".to_string(),
                arguments: json!({}),
                output: ToolOutput::default(),
                model_output: "{{nope".to_string(),
            },
        ];

        let normalized = normalize_tool_calls(&calls);
        assert_eq!(normalized.len(), 3);
        assert_eq!(normalized[0].tool, "web_search");
        assert_eq!(normalized[0].query, "acme labs");
        assert_eq!(normalized[0].id.as_deref(), Some("web1"));
        assert_eq!(normalized[0].result_count, 2);
        assert_eq!(normalized[2].tool, "broken");
        assert!(normalized[2].id.is_none());
    }

    #[test]
    fn query_derivation_joins_name_lists() {
        assert_eq!(
            derive_query(&json!({"names": ["Acme", "Acme Corp"]})),
            "Acme, Acme Corp"
        );
        assert_eq!(derive_query(&json!({"orcid": "0000-0001"})), "0000-0001");
        assert_eq!(derive_query(&json!({})), "");
    }
}

//! Completion client: plain generation, schema-constrained extraction, and
//! the tool-augmented completion loop
//!
//! The loop is written against the small [`CompletionProvider`] seam so the
//! orchestration logic stays deterministic and testable; the rig-backed
//! provider adapts it to the OpenAI API.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

use rig::client::CompletionClient as _;
use rig::completion::CompletionModel;
use rig::message::{
    AssistantContent, Message, Text, ToolCall, ToolFunction, ToolResult, ToolResultContent,
    UserContent,
};
use rig::providers::openai;
use rig::OneOrMany;

use crate::service::citations::{annotate_output, IdCounters};
use crate::tools::{ToolDefinition, ToolOutput, ToolRegistry};

/// Circuit breaker for the tool-calling loop
pub const MAX_TOOL_ITERATIONS: usize = 20;

/// Error type for LLM interactions
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM completion failed: {0}")]
    Completion(String),

    #[error("Structured extraction failed: {0}")]
    Extraction(String),
}

/// One message in a completion conversation
#[derive(Debug, Clone)]
pub enum ChatMessage {
    User {
        content: String,
    },
    Assistant {
        content: String,
    },
    /// The model requested this function call
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    /// The function call's result, as shown to the model
    ToolResult {
        id: String,
        content: String,
    },
}

/// A function call requested by the model
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One provider turn: narrative text and any requested function calls
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: String,
    pub tool_calls: Vec<ToolInvocation>,
}

/// Request for one provider turn
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub preamble: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// Seam to the LLM provider. The pipeline only ever talks to this trait.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one completion turn, possibly returning function-call requests
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Schema-constrained completion returning a JSON object matching `schema`
    async fn extract_structured(
        &self,
        prompt: &str,
        preamble: &str,
        schema: Value,
        model: &str,
    ) -> Result<Value, LlmError>;
}

/// rig-core OpenAI provider
#[derive(Clone)]
pub struct RigProvider {
    client: openai::Client,
}

impl RigProvider {
    /// Create a provider with the given API key
    pub fn new(api_key: &str) -> Self {
        Self {
            client: openai::Client::new(api_key),
        }
    }

    fn to_rig_message(message: &ChatMessage) -> Message {
        match message {
            ChatMessage::User { content } => Message::user(content.clone()),
            ChatMessage::Assistant { content } => Message::assistant(content.clone()),
            ChatMessage::ToolCall {
                id,
                name,
                arguments,
            } => Message::Assistant {
                id: None,
                content: OneOrMany::one(AssistantContent::ToolCall(ToolCall {
                    id: id.clone(),
                    call_id: None,
                    function: ToolFunction {
                        name: name.clone(),
                        arguments: arguments.clone(),
                    },
                })),
            },
            ChatMessage::ToolResult { id, content } => Message::User {
                content: OneOrMany::one(UserContent::ToolResult(ToolResult {
                    id: id.clone(),
                    call_id: None,
                    content: OneOrMany::one(ToolResultContent::Text(Text {
                        text: content.clone(),
                    })),
                })),
            },
        }
    }

    fn to_rig_tool(definition: &ToolDefinition) -> rig::completion::ToolDefinition {
        rig::completion::ToolDefinition {
            name: definition.name.clone(),
            description: definition.description.clone(),
            parameters: definition.parameters.clone(),
        }
    }
}

#[async_trait]
impl CompletionProvider for RigProvider {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut messages: Vec<Message> =
            request.messages.iter().map(Self::to_rig_message).collect();
        let prompt = if messages.is_empty() {
            Message::user(String::new())
        } else {
            messages.remove(messages.len() - 1)
        };

        let model = self.client.completion_model(&request.model);
        let mut builder = model.completion_request(prompt).messages(messages);
        if let Some(preamble) = request.preamble {
            builder = builder.preamble(preamble);
        }
        if !request.tools.is_empty() {
            builder = builder.tools(request.tools.iter().map(Self::to_rig_tool).collect());
        }

        let response = model
            .completion(builder.build())
            .await
            .map_err(|e| LlmError::Completion(e.to_string()))?;

        let mut text_parts: Vec<String> = Vec::new();
        let mut tool_calls: Vec<ToolInvocation> = Vec::new();
        for item in response.choice.into_iter() {
            match item {
                AssistantContent::Text(text) => text_parts.push(text.text),
                AssistantContent::ToolCall(call) => tool_calls.push(ToolInvocation {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                }),
            }
        }

        Ok(ChatResponse {
            text: text_parts.join("\n"),
            tool_calls,
        })
    }

    async fn extract_structured(
        &self,
        prompt: &str,
        preamble: &str,
        schema: Value,
        model: &str,
    ) -> Result<Value, LlmError> {
        let completion_model = self.client.completion_model(model);
        let request = completion_model
            .completion_request(Message::user(prompt.to_string()))
            .preamble(preamble.to_string())
            .additional_params(json!({
                "temperature": 0.0,
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {
                        "name": "extraction",
                        "schema": schema,
                    }
                }
            }))
            .build();

        let response = completion_model
            .completion(request)
            .await
            .map_err(|e| LlmError::Extraction(e.to_string()))?;

        let text = response
            .choice
            .into_iter()
            .find_map(|item| match item {
                AssistantContent::Text(text) => Some(text.text),
                _ => None,
            })
            .ok_or_else(|| LlmError::Extraction("Provider returned no text output".to_string()))?;

        serde_json::from_str(&text)
            .map_err(|e| LlmError::Extraction(format!("Malformed JSON output: {}", e)))
    }
}

/// Record of one executed tool call
#[derive(Debug, Clone)]
pub struct RawToolCall {
    pub tool_name: String,
    pub arguments: Value,
    /// The adapter's raw structured result (audit trail)
    pub output: ToolOutput,
    /// The citation-annotated JSON actually shown to the model
    pub model_output: String,
}

/// Output of one tool-augmented completion loop
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub text: String,
    pub tool_calls: Vec<RawToolCall>,
}

/// Completion client over a provider seam
pub struct CompletionClient<P: CompletionProvider> {
    provider: P,
}

impl<P: CompletionProvider> CompletionClient<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Single-shot free-form generation, no tools
    pub async fn generate_text(&self, prompt: &str, model: &str) -> Result<String, LlmError> {
        let response = self
            .provider
            .complete(ChatRequest {
                model: model.to_string(),
                preamble: None,
                messages: vec![ChatMessage::User {
                    content: prompt.to_string(),
                }],
                tools: Vec::new(),
            })
            .await?;
        Ok(response.text)
    }

    /// Schema-constrained extraction of `T` from free-form text.
    ///
    /// Fails loudly: downstream decision logic needs well-formed data, so
    /// there is no silent fallback here.
    pub async fn extract<T>(
        &self,
        text: &str,
        instructions: &str,
        model: &str,
    ) -> Result<T, LlmError>
    where
        T: JsonSchema + DeserializeOwned,
    {
        let schema = serde_json::to_value(schemars::schema_for!(T))
            .map_err(|e| LlmError::Extraction(format!("Schema generation failed: {}", e)))?;

        let start = std::time::Instant::now();
        let value = self
            .provider
            .extract_structured(text, instructions, schema, model)
            .await?;
        tracing::debug!(
            model = %model,
            elapsed_ms = start.elapsed().as_millis(),
            "Structured extraction completed"
        );

        serde_json::from_value(value)
            .map_err(|e| LlmError::Extraction(format!("Extracted object does not match schema: {}", e)))
    }

    /// The agentic loop: complete, execute any requested function calls via
    /// the registry, inject citation-annotated results, repeat.
    ///
    /// `on_tool_call` fires before each execution and `on_tool_result` fires
    /// right after, with the annotated output text; both before the loop
    /// continues, so callers can stream tool activity live. Hitting the
    /// iteration cap returns whatever text and tool calls accrued.
    #[allow(clippy::too_many_arguments)]
    pub async fn complete_with_tools(
        &self,
        prompt: &str,
        preamble: &str,
        model: &str,
        tool_names: Option<&[&str]>,
        registry: &ToolRegistry,
        counters: &mut IdCounters,
        mut on_tool_call: impl FnMut(&str, &Value),
        mut on_tool_result: impl FnMut(&str, &str),
    ) -> Result<CompletionResult, LlmError> {
        let tools = registry.tool_definitions(tool_names);
        let mut messages = vec![ChatMessage::User {
            content: prompt.to_string(),
        }];
        let mut raw_calls: Vec<RawToolCall> = Vec::new();
        let mut last_text = String::new();

        for iteration in 0..MAX_TOOL_ITERATIONS {
            let response = self
                .provider
                .complete(ChatRequest {
                    model: model.to_string(),
                    preamble: Some(preamble.to_string()),
                    messages: messages.clone(),
                    tools: tools.clone(),
                })
                .await?;

            if !response.text.is_empty() {
                last_text = response.text.clone();
            }

            if response.tool_calls.is_empty() {
                tracing::debug!(
                    iterations = iteration + 1,
                    tool_calls = raw_calls.len(),
                    "Tool loop converged"
                );
                return Ok(CompletionResult {
                    text: response.text,
                    tool_calls: raw_calls,
                });
            }

            if !response.text.is_empty() {
                messages.push(ChatMessage::Assistant {
                    content: response.text,
                });
            }

            // Sibling calls run sequentially in array order so citation
            // assignment and telemetry stay deterministic per response
            for call in response.tool_calls {
                on_tool_call(&call.name, &call.arguments);

                let output = registry.execute(&call.name, &call.arguments).await;
                let prefix = registry.citation_prefix(&call.name);
                let annotated = annotate_output(prefix, &output, counters);

                on_tool_result(&call.name, &annotated.model_output);

                messages.push(ChatMessage::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
                messages.push(ChatMessage::ToolResult {
                    id: call.id,
                    content: annotated.model_output.clone(),
                });
                raw_calls.push(RawToolCall {
                    tool_name: call.name,
                    arguments: call.arguments,
                    output,
                    model_output: annotated.model_output,
                });
            }
        }

        tracing::warn!(
            cap = MAX_TOOL_ITERATIONS,
            tool_calls = raw_calls.len(),
            "Tool loop hit iteration cap without converging, using accrued output"
        );
        Ok(CompletionResult {
            text: last_text,
            tool_calls: raw_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolAdapter;
    use std::cell::RefCell;
    use std::sync::{Arc, Mutex};

    /// Provider scripted with a fixed sequence of turns
    struct ScriptedProvider {
        turns: Mutex<Vec<ChatResponse>>,
        seen_message_counts: Mutex<Vec<usize>>,
    }

    impl ScriptedProvider {
        fn new(turns: Vec<ChatResponse>) -> Self {
            Self {
                turns: Mutex::new(turns),
                seen_message_counts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
            self.seen_message_counts
                .lock()
                .unwrap()
                .push(request.messages.len());
            let mut turns = self.turns.lock().unwrap();
            if turns.is_empty() {
                // Script exhausted: keep requesting the same tool forever
                Ok(ChatResponse {
                    text: String::new(),
                    tool_calls: vec![ToolInvocation {
                        id: "call".to_string(),
                        name: "stub".to_string(),
                        arguments: serde_json::json!({"query": "again"}),
                    }],
                })
            } else {
                Ok(turns.remove(0))
            }
        }

        async fn extract_structured(
            &self,
            _prompt: &str,
            _preamble: &str,
            _schema: Value,
            _model: &str,
        ) -> Result<Value, LlmError> {
            Err(LlmError::Extraction("not scripted".to_string()))
        }
    }

    struct StubTool;

    #[async_trait]
    impl ToolAdapter for StubTool {
        fn name(&self) -> &'static str {
            "stub"
        }
        fn citation_prefix(&self) -> &'static str {
            "stub"
        }
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "stub".to_string(),
                description: "stub".to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }
        }
        async fn execute(&self, _args: &Value) -> ToolOutput {
            ToolOutput::new(
                vec![serde_json::json!({"title": "a result"})],
                Default::default(),
            )
        }
    }

    fn stub_registry() -> ToolRegistry {
        ToolRegistry::new(vec![Arc::new(StubTool)])
    }

    fn tool_turn(query: &str) -> ChatResponse {
        ChatResponse {
            text: String::new(),
            tool_calls: vec![ToolInvocation {
                id: "call-1".to_string(),
                name: "stub".to_string(),
                arguments: serde_json::json!({ "query": query }),
            }],
        }
    }

    fn text_turn(text: &str) -> ChatResponse {
        ChatResponse {
            text: text.to_string(),
            tool_calls: Vec::new(),
        }
    }

    #[tokio::test]
    async fn loop_converges_when_no_tool_calls_requested() {
        let provider = ScriptedProvider::new(vec![tool_turn("first"), text_turn("all done")]);
        let client = CompletionClient::new(provider);
        let registry = stub_registry();
        let mut counters = IdCounters::new();

        // Both callbacks record into the same log
        let events: RefCell<Vec<String>> = RefCell::new(Vec::new());
        let result = client
            .complete_with_tools(
                "check this customer",
                "preamble",
                "test-model",
                None,
                &registry,
                &mut counters,
                |tool, _args| events.borrow_mut().push(format!("call:{}", tool)),
                |tool, _output| events.borrow_mut().push(format!("result:{}", tool)),
            )
            .await
            .unwrap();

        assert_eq!(result.text, "all done");
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].tool_name, "stub");
        assert!(result.tool_calls[0].model_output.contains("stub1"));
        assert_eq!(events.into_inner(), vec!["call:stub", "result:stub"]);
    }

    #[tokio::test]
    async fn message_list_grows_with_tool_exchanges() {
        let provider = ScriptedProvider::new(vec![tool_turn("first"), text_turn("done")]);
        let client = CompletionClient::new(provider);
        let registry = stub_registry();
        let mut counters = IdCounters::new();

        client
            .complete_with_tools(
                "prompt",
                "preamble",
                "test-model",
                None,
                &registry,
                &mut counters,
                |_, _| {},
                |_, _| {},
            )
            .await
            .unwrap();

        // First turn sees the prompt alone; second also sees the tool-call
        // and tool-result messages
        let counts = client.provider.seen_message_counts.lock().unwrap().clone();
        assert_eq!(counts, vec![1, 3]);
    }

    #[tokio::test]
    async fn iteration_cap_returns_accrued_output() {
        // Empty script: the provider requests a tool call on every turn
        let provider = ScriptedProvider::new(Vec::new());
        let client = CompletionClient::new(provider);
        let registry = stub_registry();
        let mut counters = IdCounters::new();

        let result = client
            .complete_with_tools(
                "prompt",
                "preamble",
                "test-model",
                None,
                &registry,
                &mut counters,
                |_, _| {},
                |_, _| {},
            )
            .await
            .unwrap();

        assert_eq!(result.tool_calls.len(), MAX_TOOL_ITERATIONS);
        // Citation IDs kept incrementing through every iteration
        assert!(result
            .tool_calls
            .last()
            .unwrap()
            .model_output
            .contains(&format!("stub{}", MAX_TOOL_ITERATIONS)));
    }

    #[test]
    fn tool_exchange_maps_to_rig_messages() {
        let call = RigProvider::to_rig_message(&ChatMessage::ToolCall {
            id: "c1".to_string(),
            name: "stub".to_string(),
            arguments: serde_json::json!({"q": "acme"}),
        });
        let Message::Assistant { id, content } = call else {
            panic!("expected assistant message");
        };
        assert!(id.is_none());
        let AssistantContent::ToolCall(tc) = content.first() else {
            panic!("expected tool call content");
        };
        assert_eq!(tc.id, "c1");
        assert!(tc.call_id.is_none());
        assert_eq!(tc.function.name, "stub");

        let result = RigProvider::to_rig_message(&ChatMessage::ToolResult {
            id: "c1".to_string(),
            content: "out".to_string(),
        });
        let Message::User { content } = result else {
            panic!("expected user message");
        };
        let UserContent::ToolResult(tr) = content.first() else {
            panic!("expected tool result content");
        };
        assert_eq!(tr.id, "c1");
    }

    #[tokio::test]
    async fn generate_text_passes_through() {
        let provider = ScriptedProvider::new(vec![text_turn("a sentence")]);
        let client = CompletionClient::new(provider);
        let text = client.generate_text("say something", "test-model").await.unwrap();
        assert_eq!(text, "a sentence");
    }
}

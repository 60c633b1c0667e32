//! Chat-completions backends.
//!
//! [`OpenAiProvider`] speaks the OpenAI `/v1/chat/completions` protocol with
//! function calling. [`MockProvider`] replays a scripted queue of responses
//! and records every request, for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use scout_core::config::{Config, ProviderConfig};
use scout_harness::provider::{
    LlmProvider, Message, ProviderError, Response, Tool, ToolCall, Usage,
};

// The harness does not depend on reqwest, so transport errors are mapped here.
fn from_reqwest(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Other(format!("HTTP error: {err}"))
    }
}

/// Milliseconds to wait from a `Retry-After` header given in seconds.
/// Absent or unparsable values mean "no hint".
fn retry_after_ms(header: Option<&str>) -> u64 {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// OpenAiProvider
// ---------------------------------------------------------------------------

/// LLM provider for the OpenAI Chat Completions API (or any compatible
/// endpoint reachable through `base_url`).
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            model: model.into(),
            max_tokens: 4096,
            temperature: 0.2,
        }
    }

    /// Build a provider from the `[provider]` config section, reading the
    /// API key from the configured environment variable.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let section: &ProviderConfig = &config.provider;
        let api_key = config.provider_api_key().ok_or_else(|| {
            ProviderError::NotConfigured(format!("{} is not set", section.api_key_env))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(section.timeout_secs))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            client,
            api_key,
            base_url: section.base_url.trim_end_matches('/').to_string(),
            model: section.model.clone(),
            max_tokens: section.max_tokens,
            temperature: section.temperature,
        })
    }

    /// Override the base URL (useful for testing or compatible gateways).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// JSON request body for one round trip.
    pub fn build_request_body(&self, messages: &[Message], tools: Option<&[Tool]>) -> Value {
        let api_messages: Vec<Value> = messages.iter().map(wire_message).collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": api_messages,
        });
        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            body["tools"] = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
        }
        body
    }
}

fn wire_message(msg: &Message) -> Value {
    let mut out = json!({
        "role": msg.role,
        "content": msg.content,
    });
    if let Some(id) = &msg.tool_call_id {
        out["tool_call_id"] = json!(id);
    }
    if !msg.tool_calls.is_empty() {
        out["tool_calls"] = msg
            .tool_calls
            .iter()
            .map(|c| {
                json!({
                    "id": c.id,
                    "type": "function",
                    "function": {"name": c.name, "arguments": c.arguments},
                })
            })
            .collect();
    }
    out
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageResp,
}

#[derive(Deserialize)]
struct OpenAiMessageResp {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCall>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl OpenAiResponse {
    /// First choice as a provider response; `None` when there are no choices.
    fn into_response(self) -> Option<Response> {
        let choice = self.choices.into_iter().next()?;
        Some(Response {
            content: choice.message.content.filter(|c| !c.is_empty()),
            tool_calls: choice
                .message
                .tool_calls
                .into_iter()
                .map(|c| ToolCall {
                    id: c.id,
                    name: c.function.name,
                    arguments: c.function.arguments,
                })
                .collect(),
            model: self.model,
            usage: self.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<Tool>>,
    ) -> Result<Response, ProviderError> {
        let body = self.build_request_body(&messages, tools.as_deref());
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %self.model, messages = messages.len(), "chat completion request");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status().as_u16();

        if status == 429 {
            let retry_after_ms = retry_after_ms(
                resp.headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok()),
            );
            return Err(ProviderError::RateLimited { retry_after_ms });
        }

        if status == 401 || status == 403 {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Unauthorized(text));
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!("status {status}: {text}")));
        }

        let api_resp: OpenAiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("parse error: {e}")))?;

        api_resp
            .into_response()
            .ok_or_else(|| ProviderError::Api("no choices in response".into()))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ---------------------------------------------------------------------------
// MockProvider
// ---------------------------------------------------------------------------

/// A scripted provider for tests.
///
/// Each call to `chat` pops the next queued response. If the queue is empty,
/// returns a default text response.
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Result<Response, ProviderError>>>>,
    #[allow(clippy::type_complexity)]
    captured_requests: Arc<Mutex<Vec<(Vec<Message>, Option<Vec<Tool>>)>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            captured_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful response.
    pub fn with_response(self, response: Response) -> Self {
        self.lock_responses().push_back(Ok(response));
        self
    }

    /// Queue an error response.
    pub fn with_error(self, error: ProviderError) -> Self {
        self.lock_responses().push_back(Err(error));
        self
    }

    /// Queue a `final_result` tool call carrying `arguments`.
    pub fn with_final_result(self, arguments: Value) -> Self {
        let call = ToolCall {
            id: format!("call_final_{}", self.lock_responses().len()),
            name: scout_harness::repo_tools::FINAL_RESULT_TOOL.to_string(),
            arguments: arguments.to_string(),
        };
        self.with_response(Response::calls(vec![call]).with_usage(10, 5))
    }

    /// Every request seen so far, oldest first.
    pub fn captured_requests(&self) -> Vec<(Vec<Message>, Option<Vec<Tool>>)> {
        self.captured_requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn remaining(&self) -> usize {
        self.lock_responses().len()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Response, ProviderError>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn default_response() -> Response {
        Response {
            content: Some("Mock response".to_string()),
            tool_calls: Vec::new(),
            model: "mock".to_string(),
            usage: Some(Usage {
                input_tokens: 10,
                output_tokens: 5,
            }),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<Tool>>,
    ) -> Result<Response, ProviderError> {
        self.captured_requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((messages, tools));

        self.lock_responses()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::default_response()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use scout_harness::provider::Role;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new("sk-test", "gpt-4o").with_base_url("http://localhost:1")
    }

    #[tokio::test]
    async fn mock_provider_returns_default_response() {
        let mock = MockProvider::new();
        let resp = mock.chat(vec![Message::user("hi")], None).await.unwrap();
        assert_eq!(resp.content.as_deref(), Some("Mock response"));
        assert!(resp.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn mock_provider_returns_queued_in_order() {
        let mock = MockProvider::new()
            .with_response(Response::text("first"))
            .with_error(ProviderError::Timeout);
        let first = mock.chat(vec![], None).await.unwrap();
        assert_eq!(first.content.as_deref(), Some("first"));
        assert!(matches!(
            mock.chat(vec![], None).await,
            Err(ProviderError::Timeout)
        ));
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn mock_provider_captures_requests() {
        let mock = MockProvider::new();
        let tools = vec![Tool {
            name: "search_code".into(),
            description: "search".into(),
            parameters: json!({"type": "object"}),
        }];
        mock.chat(vec![Message::system("sys"), Message::user("q")], Some(tools))
            .await
            .unwrap();
        let captured = mock.captured_requests();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].0[0].role, Role::System);
        assert_eq!(captured[0].1.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn request_body_wraps_tools_as_functions() {
        let tools = vec![Tool {
            name: "list_issues".into(),
            description: "List issues".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let body = provider().build_request_body(&[Message::user("q")], Some(&tools));
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "list_issues");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn request_body_omits_empty_tool_list() {
        let body = provider().build_request_body(&[Message::user("q")], Some(&[]));
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn replayed_tool_turns_keep_wire_shape() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "get_repo_details".into(),
            arguments: "{}".into(),
        };
        let messages = vec![
            Message::assistant_tool_calls("", vec![call]),
            Message::tool("call_1", "get_repo_details", "{\"name\":\"widgets\"}"),
        ];
        let body = provider().build_request_body(&messages, None);
        let call = &body["messages"][0]["tool_calls"][0];
        assert_eq!(call["id"], "call_1");
        assert_eq!(call["function"]["arguments"], "{}");
        assert_eq!(body["messages"][1]["role"], "tool");
        assert_eq!(body["messages"][1]["tool_call_id"], "call_1");
    }

    #[test]
    fn response_parsing_extracts_tool_calls_and_usage() {
        let api: OpenAiResponse = serde_json::from_value(json!({
            "model": "gpt-4o-2024-08-06",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "search_code", "arguments": "{\"query\":\"Config\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 14, "total_tokens": 134}
        }))
        .unwrap();
        let resp = api.into_response().unwrap();
        assert!(resp.content.is_none());
        assert_eq!(resp.tool_calls[0].name, "search_code");
        assert_eq!(resp.tool_calls[0].arguments, "{\"query\":\"Config\"}");
        assert_eq!(resp.usage.unwrap().input_tokens, 120);
    }

    #[test]
    fn empty_choices_yield_none() {
        let api: OpenAiResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(api.into_response().is_none());
    }

    #[test]
    fn retry_after_header_is_converted_without_overflow() {
        assert_eq!(retry_after_ms(Some("3")), 3_000);
        assert_eq!(retry_after_ms(Some(" 12 ")), 12_000);
        assert_eq!(retry_after_ms(Some(&u64::MAX.to_string())), u64::MAX);
        assert_eq!(retry_after_ms(Some("18446744073709552")), u64::MAX);
        assert_eq!(retry_after_ms(Some("Wed, 21 Oct 2015 07:28:00 GMT")), 0);
        assert_eq!(retry_after_ms(None), 0);
    }

    #[test]
    fn from_config_requires_api_key() {
        let mut config = Config::default();
        config.provider.api_key_env = "SCOUT_TEST_KEY_THAT_IS_NEVER_SET".into();
        let err = OpenAiProvider::from_config(&config).err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(ref m) if m.contains("SCOUT_TEST_KEY")));
    }
}

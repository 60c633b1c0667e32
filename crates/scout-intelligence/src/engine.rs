//! The query state machine: `START → {reasoning, tool-call}* → FINAL`.
//!
//! One [`ConversationEngine::run`] sends the instructions, the replayed prior
//! history and the new user message to the model, executes whatever tool
//! calls come back, and repeats until the model produces a final answer or
//! the iteration bound is hit. [`ConversationEngine::run_blocking`] drives
//! the same future on a private current-thread runtime.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error, info, warn, Instrument};

use scout_core::config::Config;
use scout_core::data_source::RepoDataSource;
use scout_core::{HistoryMessage, SessionContext, StructuredResult};
use scout_harness::provider::{LlmProvider, Message, Tool, ToolCall};
use scout_harness::repo_tools::{final_result_tool, FINAL_RESULT_TOOL};
use scout_harness::{ToolContext, ToolError, ToolRegistry};
use scout_telemetry::tracing_setup::{query_span, tool_span};

use crate::cost::UsageTracker;
use crate::validator::{self, ResultValidationError};
use crate::AgentError;

/// Sent back when the model replies with prose instead of a final answer.
const FINAL_ANSWER_NUDGE: &str =
    "Respond by calling the final_result tool with your answer, sources and confidence.";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on model round trips per query.
    pub max_iterations: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_iterations: 8 }
    }
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_iterations: config.agent.max_tool_iterations.max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Run output
// ---------------------------------------------------------------------------

/// One tool execution, kept for observability only.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationRecord {
    pub tool_name: String,
    pub call_id: String,
    pub arguments: Value,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub outcome: Result<(), String>,
}

#[derive(Debug, Clone)]
pub struct EngineRun {
    pub result: StructuredResult,
    /// Prior history followed by `new_messages`.
    pub history: Vec<HistoryMessage>,
    /// The user turn, every tool-call/tool-result pair, and the final answer.
    pub new_messages: Vec<HistoryMessage>,
    pub invocations: Vec<ToolInvocationRecord>,
    pub usage: UsageTracker,
    /// Model round trips used.
    pub iterations: u32,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ConversationEngine {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    source: Arc<dyn RepoDataSource>,
    config: EngineConfig,
}

impl ConversationEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        source: Arc<dyn RepoDataSource>,
    ) -> Self {
        Self {
            provider,
            registry,
            source,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn source(&self) -> &Arc<dyn RepoDataSource> {
        &self.source
    }

    /// Tool definitions sent with every round trip: the registry plus the
    /// reserved final-answer tool.
    pub fn advertised_tools(&self) -> Vec<Tool> {
        let mut tools = self.registry.to_provider_tools();
        tools.push(final_result_tool());
        tools
    }

    /// Answer `query` in the conversation described by `prior`.
    ///
    /// On error nothing is returned for the history; callers keep their
    /// previous copy untouched.
    pub async fn run(
        &self,
        instructions: &str,
        ctx: &SessionContext,
        query: &str,
        prior: &[HistoryMessage],
    ) -> Result<EngineRun, AgentError> {
        let (span, trace_id) = query_span(&ctx.repo().to_string());
        let started = Instant::now();
        let outcome = self
            .drive(instructions, ctx, query, prior, &trace_id)
            .instrument(span.clone())
            .await;
        let _guard = span.enter();
        match &outcome {
            Ok(run) => info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                iterations = run.iterations,
                tool_calls = run.invocations.len(),
                confidence = run.result.confidence,
                "query completed"
            ),
            Err(e) => error!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "query failed"
            ),
        }
        outcome
    }

    /// Blocking form of [`run`](Self::run) for callers outside any async
    /// runtime. Called from inside a Tokio runtime it fails with
    /// [`AgentError::Runtime`] instead of blocking a worker thread.
    pub fn run_blocking(
        &self,
        instructions: &str,
        ctx: &SessionContext,
        query: &str,
        prior: &[HistoryMessage],
    ) -> Result<EngineRun, AgentError> {
        block_on(self.run(instructions, ctx, query, prior))?
    }

    async fn drive(
        &self,
        instructions: &str,
        ctx: &SessionContext,
        query: &str,
        prior: &[HistoryMessage],
        trace_id: &str,
    ) -> Result<EngineRun, AgentError> {
        info!(query, prior_messages = prior.len(), "starting query");

        let tools = self.advertised_tools();
        let mut messages = Vec::with_capacity(prior.len() + 2);
        messages.push(Message::system(instructions));
        messages.extend(replay(prior));
        messages.push(Message::user(query));

        let mut new_messages = vec![HistoryMessage::user(query)];
        let mut invocations = Vec::new();
        let mut usage = UsageTracker::new();
        let tool_ctx = ToolContext {
            session: ctx,
            source: self.source.as_ref(),
        };

        for iteration in 1..=self.config.max_iterations {
            let response = self
                .provider
                .chat(messages.clone(), Some(tools.clone()))
                .await?;
            usage.record(response.usage);
            debug!(
                iteration,
                tool_calls = response.tool_calls.len(),
                has_text = response.content.is_some(),
                "model responded"
            );

            if let Some(call) = response
                .tool_calls
                .iter()
                .find(|c| c.name == FINAL_RESULT_TOOL)
            {
                if response.tool_calls.len() > 1 {
                    debug!("final answer given alongside other tool calls; those are not run");
                }
                let result = final_from_arguments(&call.arguments)?;
                return Ok(finish(result, prior, new_messages, invocations, usage, iteration));
            }

            if !response.tool_calls.is_empty() {
                messages.push(Message::assistant_tool_calls(
                    response.content.clone().unwrap_or_default(),
                    response.tool_calls.clone(),
                ));
                for call in &response.tool_calls {
                    let span = tool_span(trace_id, &call.name, &call.id);
                    let (record, output) = self.invoke(call, tool_ctx).instrument(span).await;
                    new_messages.push(HistoryMessage::tool_call(
                        &call.id,
                        &call.name,
                        record.arguments.clone(),
                    ));
                    invocations.push(record);
                    let output = output.map_err(|source| AgentError::Tool {
                        tool: call.name.clone(),
                        source,
                    })?;
                    messages.push(Message::tool(&call.id, &call.name, tool_text(&output)));
                    new_messages.push(HistoryMessage::tool_result(&call.id, &call.name, output));
                }
                continue;
            }

            let text = response.content.unwrap_or_default();
            match validator::parse_text(&text) {
                Some(parsed) => {
                    let result = parsed?;
                    return Ok(finish(result, prior, new_messages, invocations, usage, iteration));
                }
                None => {
                    warn!(iteration, "model replied without a final answer; nudging");
                    messages.push(Message::assistant(text));
                    messages.push(Message::user(FINAL_ANSWER_NUDGE));
                }
            }
        }

        Err(AgentError::IterationLimit {
            limit: self.config.max_iterations,
        })
    }

    async fn invoke(
        &self,
        call: &ToolCall,
        ctx: ToolContext<'_>,
    ) -> (ToolInvocationRecord, Result<Value, ToolError>) {
        let started_at = Utc::now();
        let start = Instant::now();

        let parsed = parse_arguments(&call.arguments);
        let arguments = parsed.as_ref().cloned().unwrap_or(Value::Null);
        let output = match parsed {
            Ok(args) => self.registry.invoke(&call.name, ctx, &args).await,
            Err(e) => Err(e),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &output {
            Ok(_) => info!(tool = %call.name, call_id = %call.id, elapsed_ms, "tool call succeeded"),
            Err(e) => error!(
                tool = %call.name,
                call_id = %call.id,
                elapsed_ms,
                kind = ?e.kind(),
                error = %e,
                "tool call failed"
            ),
        }

        let record = ToolInvocationRecord {
            tool_name: call.name.clone(),
            call_id: call.id.clone(),
            arguments,
            started_at,
            elapsed_ms,
            outcome: output.as_ref().map(|_| ()).map_err(ToString::to_string),
        };
        (record, output)
    }
}

fn finish(
    result: StructuredResult,
    prior: &[HistoryMessage],
    mut new_messages: Vec<HistoryMessage>,
    invocations: Vec<ToolInvocationRecord>,
    usage: UsageTracker,
    iterations: u32,
) -> EngineRun {
    new_messages.push(HistoryMessage::final_answer(result.clone()));
    let mut history = Vec::with_capacity(prior.len() + new_messages.len());
    history.extend_from_slice(prior);
    history.extend(new_messages.iter().cloned());
    EngineRun {
        result,
        history,
        new_messages,
        invocations,
        usage,
        iterations,
    }
}

/// Drive `future` to completion on a fresh current-thread runtime.
pub(crate) fn block_on<F: std::future::Future>(future: F) -> Result<F::Output, AgentError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(AgentError::Runtime(
            "blocking call made from inside an async runtime; use the async entry point".into(),
        ));
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AgentError::Runtime(format!("failed to start runtime: {e}")))?;
    Ok(runtime.block_on(future))
}

fn parse_arguments(raw: &str) -> Result<Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(raw)
        .map_err(|e| ToolError::Validation(format!("arguments are not valid JSON: {e}")))
}

fn final_from_arguments(raw: &str) -> Result<StructuredResult, AgentError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ResultValidationError::Malformed(e.to_string()))?;
    Ok(validator::validate_value(&value)?)
}

fn tool_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Rebuild wire messages from persisted history.
///
/// Consecutive tool-call turns become one assistant message carrying all of
/// them, followed by their tool results. Calls that never got a result, and
/// results whose call is missing, are dropped: the chat protocol rejects
/// either.
pub fn replay(prior: &[HistoryMessage]) -> Vec<Message> {
    let answered: HashSet<&str> = prior
        .iter()
        .filter_map(|m| match m {
            HistoryMessage::ToolResult { call_id, .. } => Some(call_id.as_str()),
            _ => None,
        })
        .collect();

    let mut out = Vec::with_capacity(prior.len());
    let mut pending: Vec<ToolCall> = Vec::new();
    let mut issued: HashSet<&str> = HashSet::new();

    for msg in prior {
        if !matches!(msg, HistoryMessage::ToolCall { .. }) && !pending.is_empty() {
            out.push(Message::assistant_tool_calls("", std::mem::take(&mut pending)));
        }
        match msg {
            HistoryMessage::User { content, .. } => out.push(Message::user(content.clone())),
            HistoryMessage::Assistant { content, .. } => {
                out.push(Message::assistant(content.clone()))
            }
            HistoryMessage::ToolCall {
                call_id,
                tool_name,
                arguments,
                ..
            } => {
                if answered.contains(call_id.as_str()) {
                    issued.insert(call_id.as_str());
                    pending.push(ToolCall {
                        id: call_id.clone(),
                        name: tool_name.clone(),
                        arguments: arguments.to_string(),
                    });
                }
            }
            HistoryMessage::ToolResult {
                call_id,
                tool_name,
                content,
                ..
            } => {
                if issued.contains(call_id.as_str()) {
                    out.push(Message::tool(call_id, tool_name, tool_text(content)));
                }
            }
        }
    }
    if !pending.is_empty() {
        out.push(Message::assistant_tool_calls("", pending));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use scout_core::RepoKey;
    use scout_harness::provider::{ProviderError, Response, Role};
    use scout_harness::repo_tools::default_registry;
    use scout_harness::testing::{issue, FixtureSource};

    use crate::llm::MockProvider;

    use super::*;

    fn call(id: &str, name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args.to_string(),
        }
    }

    fn engine(provider: MockProvider, source: FixtureSource) -> (ConversationEngine, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let engine = ConversationEngine::new(
            provider.clone(),
            Arc::new(default_registry()),
            Arc::new(source),
        );
        (engine, provider)
    }

    fn session() -> SessionContext {
        SessionContext::new("ghp_test", RepoKey::parse("octo/widgets").unwrap())
    }

    #[tokio::test]
    async fn direct_final_answer_without_tools() {
        let (engine, provider) = engine(
            MockProvider::new().with_final_result(json!({
                "answer": "A Rust library.", "sources": [], "confidence": 0.6
            })),
            FixtureSource::new("octo/widgets"),
        );
        let run = engine.run("sys", &session(), "What is this?", &[]).await.unwrap();

        assert_eq!(run.result.answer, "A Rust library.");
        assert_eq!(run.iterations, 1);
        assert!(run.invocations.is_empty());
        assert_eq!(run.new_messages.len(), 2);
        assert_eq!(run.new_messages[0].role(), "user");
        assert_eq!(run.new_messages[1].role(), "assistant");

        let captured = provider.captured_requests();
        let (messages, tools) = &captured[0];
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages.last().unwrap().content, "What is this?");
        let tools = tools.as_ref().unwrap();
        assert_eq!(tools.len(), 9);
        assert!(tools.iter().any(|t| t.name == FINAL_RESULT_TOOL));
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_in_call_order() {
        let provider = MockProvider::new()
            .with_response(Response::calls(vec![
                call("c1", "analyze_issues", json!({"query": "bug"})),
                call("c2", "get_repo_details", json!({})),
            ]))
            .with_final_result(json!({
                "answer": "One open bug: #1.", "sources": ["#1"], "confidence": 0.9
            }));
        let source = FixtureSource::new("octo/widgets").with_issues(vec![
            issue(1, "Fix bug", "open", &["bug"]),
            issue(2, "Add feature", "open", &["enhancement"]),
        ]);
        let (engine, provider) = engine(provider, source);
        let run = engine.run("sys", &session(), "bugs?", &[]).await.unwrap();

        let roles: Vec<_> = run.new_messages.iter().map(HistoryMessage::role).collect();
        assert_eq!(
            roles,
            ["user", "tool-call", "tool-result", "tool-call", "tool-result", "assistant"]
        );
        assert_eq!(run.invocations.len(), 2);
        assert!(run.invocations.iter().all(|r| r.outcome.is_ok()));
        assert_eq!(run.invocations[0].arguments, json!({"query": "bug"}));

        let second = &provider.captured_requests()[1].0;
        let n = second.len();
        assert_eq!(second[n - 3].tool_calls.len(), 2);
        assert_eq!(second[n - 2].tool_call_id.as_deref(), Some("c1"));
        assert!(second[n - 2].content.contains("Found 1 issues"));
        assert_eq!(second[n - 1].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(run.usage.requests, 2);
    }

    #[tokio::test]
    async fn unknown_tool_is_fatal() {
        let (engine, _) = engine(
            MockProvider::new().with_response(Response::calls(vec![call(
                "c1",
                "delete_repository",
                json!({}),
            )])),
            FixtureSource::new("octo/widgets"),
        );
        let err = engine.run("sys", &session(), "q", &[]).await.unwrap_err();
        match err {
            AgentError::Tool { tool, source } => {
                assert_eq!(tool, "delete_repository");
                assert!(matches!(source, ToolError::UnknownTool(_)));
            }
            other => panic!("expected tool error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_tool_arguments_are_validation_errors() {
        let bad = ToolCall {
            id: "c1".into(),
            name: "search_code".into(),
            arguments: "{\"query\": ".into(),
        };
        let (engine, _) = engine(
            MockProvider::new().with_response(Response::calls(vec![bad])),
            FixtureSource::new("octo/widgets"),
        );
        let err = engine.run("sys", &session(), "q", &[]).await.unwrap_err();
        assert_eq!(err.kind(), scout_core::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn prose_reply_is_nudged_then_json_text_accepted() {
        let provider = MockProvider::new()
            .with_response(Response::text("Let me think about that."))
            .with_response(Response::text(
                "{\"answer\": \"Yes\", \"sources\": [], \"confidence\": 0.8}",
            ));
        let (engine, provider) = engine(provider, FixtureSource::new("octo/widgets"));
        let run = engine.run("sys", &session(), "q", &[]).await.unwrap();

        assert_eq!(run.result.answer, "Yes");
        assert_eq!(run.iterations, 2);
        assert_eq!(run.new_messages.len(), 2);
        let second = &provider.captured_requests()[1].0;
        assert_eq!(second.last().unwrap().content, FINAL_ANSWER_NUDGE);
    }

    #[tokio::test]
    async fn iteration_limit_bounds_the_loop() {
        let mut provider = MockProvider::new();
        for i in 0..5 {
            provider = provider.with_response(Response::calls(vec![call(
                &format!("c{i}"),
                "get_repo_details",
                json!({}),
            )]));
        }
        let (engine, provider) = engine(provider, FixtureSource::new("octo/widgets"));
        let engine = engine.with_config(EngineConfig { max_iterations: 3 });
        let err = engine.run("sys", &session(), "q", &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::IterationLimit { limit: 3 }));
        assert_eq!(provider.captured_requests().len(), 3);
    }

    #[tokio::test]
    async fn out_of_range_final_answer_is_rejected() {
        let (engine, _) = engine(
            MockProvider::new().with_final_result(json!({"answer": "x", "confidence": 1.5})),
            FixtureSource::new("octo/widgets"),
        );
        let err = engine.run("sys", &session(), "q", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::InvalidResult(ResultValidationError::ConfidenceOutOfRange(c)) if c == 1.5
        ));
    }

    #[tokio::test]
    async fn provider_errors_propagate() {
        let (engine, _) = engine(
            MockProvider::new().with_error(ProviderError::Unauthorized("bad key".into())),
            FixtureSource::new("octo/widgets"),
        );
        let err = engine.run("sys", &session(), "q", &[]).await.unwrap_err();
        assert_eq!(err.kind(), scout_core::ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn blocking_entry_rejects_nested_runtime() {
        let (engine, _) = engine(MockProvider::new(), FixtureSource::new("octo/widgets"));
        let err = engine.run_blocking("sys", &session(), "q", &[]).unwrap_err();
        assert!(matches!(err, AgentError::Runtime(_)));
    }

    #[test]
    fn blocking_entry_runs_outside_runtime() {
        let (engine, _) = engine(
            MockProvider::new().with_final_result(json!({"answer": "ok", "confidence": 0.5})),
            FixtureSource::new("octo/widgets"),
        );
        let run = engine.run_blocking("sys", &session(), "q", &[]).unwrap();
        assert_eq!(run.result.answer, "ok");
    }

    #[test]
    fn replay_groups_calls_and_drops_orphans() {
        let prior = vec![
            HistoryMessage::user("first"),
            HistoryMessage::tool_call("a", "list_issues", json!({})),
            HistoryMessage::tool_call("b", "list_commits", json!({})),
            HistoryMessage::tool_call("orphan", "search_code", json!({"query": "x"})),
            HistoryMessage::tool_result("a", "list_issues", json!([])),
            HistoryMessage::tool_result("b", "list_commits", json!("done")),
            HistoryMessage::tool_result("stray", "search_code", json!({})),
            HistoryMessage::assistant("answer"),
        ];
        let wire = replay(&prior);
        assert_eq!(wire.len(), 5);
        assert_eq!(wire[0].role, Role::User);
        let ids: Vec<_> = wire[1].tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(wire[2].content, "[]");
        assert_eq!(wire[3].content, "done");
        assert_eq!(wire[4].role, Role::Assistant);
    }

    #[tokio::test]
    async fn prior_history_is_replayed_before_new_query() {
        let prior = vec![
            HistoryMessage::user("earlier question"),
            HistoryMessage::assistant("earlier answer"),
        ];
        let (engine, provider) = engine(
            MockProvider::new().with_final_result(json!({"answer": "ok", "confidence": 0.5})),
            FixtureSource::new("octo/widgets"),
        );
        let run = engine.run("sys", &session(), "follow-up", &prior).await.unwrap();
        assert_eq!(run.history.len(), 4);
        assert_eq!(run.history[..2], prior[..]);

        let sent = &provider.captured_requests()[0].0;
        let contents: Vec<_> = sent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["sys", "earlier question", "earlier answer", "follow-up"]);
    }
}

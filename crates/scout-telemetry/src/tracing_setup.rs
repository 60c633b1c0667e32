use uuid::Uuid;

/// Trace id for one query: 32 hex characters (128 bits).
pub fn generate_trace_id() -> String {
    Uuid::new_v4().as_simple().to_string()
}

/// Span id: the first 16 hex characters (64 bits) of a fresh UUID.
pub fn generate_span_id() -> String {
    let mut id = Uuid::new_v4().as_simple().to_string();
    id.truncate(16);
    id
}

/// Root span for a named operation. Returns the span and its trace id so
/// child spans and log lines can be correlated.
pub fn create_operation_span(operation: &str) -> (tracing::Span, String) {
    let trace_id = generate_trace_id();
    let span = tracing::info_span!(
        "operation",
        trace_id = %trace_id,
        span_id = %generate_span_id(),
        operation = %operation,
    );
    (span, trace_id)
}

/// Child span under an existing trace id.
pub fn create_child_span(trace_id: &str, operation: &str) -> tracing::Span {
    tracing::info_span!(
        "operation",
        trace_id = %trace_id,
        span_id = %generate_span_id(),
        operation = %operation,
    )
}

/// Root span for one user query against a repository.
pub fn query_span(repo: &str) -> (tracing::Span, String) {
    let trace_id = generate_trace_id();
    let span = tracing::info_span!(
        "query",
        trace_id = %trace_id,
        span_id = %generate_span_id(),
        repo = %repo,
    );
    (span, trace_id)
}

/// Child span wrapping one tool invocation.
pub fn tool_span(trace_id: &str, tool: &str, call_id: &str) -> tracing::Span {
    tracing::info_span!(
        "tool",
        trace_id = %trace_id,
        span_id = %generate_span_id(),
        tool = %tool,
        call_id = %call_id,
    )
}

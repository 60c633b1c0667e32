use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use scout_core::data_source::{DataSourceError, RepoDataSource};
use scout_core::{ErrorKind, SessionContext};

use crate::provider::Tool;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    Validation(String),

    /// The collaborator answered, but with the wrong shape (file vs directory).
    #[error("{0}")]
    Shape(String),

    #[error(transparent)]
    Source(#[from] DataSourceError),

    #[error("failed to encode tool output: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::UnknownTool(_) | ToolError::Validation(_) => ErrorKind::Validation,
            ToolError::Shape(_) => ErrorKind::NotFound,
            ToolError::Source(e) => e.kind(),
            ToolError::Encode(_) => ErrorKind::Internal,
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter schema
// ---------------------------------------------------------------------------

/// Semantic type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    /// A string restricted to the listed values (case-insensitive).
    OneOf(&'static [&'static str]),
}

impl ParamKind {
    fn json_type(self) -> &'static str {
        match self {
            ParamKind::String | ParamKind::OneOf(_) => "string",
        }
    }

    /// Normalised value if `value` conforms, `None` otherwise.
    fn check(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ParamKind::String, Value::String(_)) => Some(value.clone()),
            (ParamKind::OneOf(allowed), Value::String(s)) => {
                let lower = s.trim().to_ascii_lowercase();
                allowed
                    .iter()
                    .find(|a| **a == lower)
                    .map(|a| Value::String((*a).to_string()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::OneOf(allowed) => write!(f, "one of {}", allowed.join("|")),
            other => f.write_str(other.json_type()),
        }
    }
}

fn describe_json(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    /// Used for optional parameters that are absent or mistyped.
    pub default: Option<Value>,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            description,
        }
    }

    pub fn optional(
        name: &'static str,
        kind: ParamKind,
        default: Option<Value>,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            required: false,
            default,
            description,
        }
    }
}

/// JSON shape a handler promises to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    Object,
    Array,
}

impl ReturnShape {
    fn matches(self, value: &Value) -> bool {
        match self {
            ReturnShape::Object => value.is_object(),
            ReturnShape::Array => value.is_array(),
        }
    }
}

// ---------------------------------------------------------------------------
// Arguments boundary
// ---------------------------------------------------------------------------

/// Arguments that passed [`resolve_args`]: every required parameter is
/// present with the declared type, and optional ones are either well-typed
/// or replaced by their default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    values: Map<String, Value>,
}

impl ToolArgs {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// For parameters declared required; resolution already guaranteed them.
    pub fn require_str(&self, name: &str) -> Result<&str, ToolError> {
        self.str(name)
            .ok_or_else(|| ToolError::Validation(format!("missing required parameter '{name}'")))
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

/// Check `raw` against `params`.
///
/// Required parameters that are missing or of the wrong type fail with
/// [`ToolError::Validation`]. Optional parameters that are missing or of the
/// wrong type silently take their declared default, since models sometimes
/// send placeholder objects where a string is expected. Unknown keys are
/// dropped.
pub fn resolve_args(params: &[ParamSpec], raw: &Value) -> Result<ToolArgs, ToolError> {
    let empty = Map::new();
    let object = match raw {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            if params.iter().any(|p| p.required) {
                return Err(ToolError::Validation(format!(
                    "expected an arguments object, got {}",
                    describe_json(other)
                )));
            }
            debug!(got = describe_json(other), "non-object arguments; using defaults");
            &empty
        }
    };

    let mut values = Map::new();
    for param in params {
        let supplied = object.get(param.name).filter(|v| !v.is_null());
        match supplied.map(|v| (v, param.kind.check(v))) {
            Some((_, Some(ok))) => {
                values.insert(param.name.to_string(), ok);
            }
            Some((bad, None)) if param.required => {
                return Err(ToolError::Validation(format!(
                    "parameter '{}' expected {}, got {}",
                    param.name,
                    param.kind,
                    describe_json(bad)
                )));
            }
            None if param.required => {
                return Err(ToolError::Validation(format!(
                    "missing required parameter '{}'",
                    param.name
                )));
            }
            mismatch => {
                if let Some((bad, _)) = mismatch {
                    debug!(
                        param = param.name,
                        got = describe_json(bad),
                        "optional parameter mistyped; using default"
                    );
                }
                if let Some(default) = &param.default {
                    values.insert(param.name.to_string(), default.clone());
                }
            }
        }
    }
    Ok(ToolArgs { values })
}

// ---------------------------------------------------------------------------
// Handlers and descriptors
// ---------------------------------------------------------------------------

/// Everything a handler may touch for one invocation.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    pub session: &'a SessionContext,
    pub source: &'a dyn RepoDataSource,
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: ToolContext<'_>, args: &ToolArgs) -> Result<Value, ToolError>;
}

#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub returns: ReturnShape,
    pub handler: Arc<dyn ToolHandler>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    /// JSON Schema for the arguments object.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for p in &self.params {
            let mut prop = json!({
                "type": p.kind.json_type(),
                "description": p.description,
            });
            if let ParamKind::OneOf(allowed) = p.kind {
                prop["enum"] = json!(allowed);
            }
            if let Some(default) = &p.default {
                prop["default"] = default.clone();
            }
            properties.insert(p.name.to_string(), prop);
            if p.required {
                required.push(p.name);
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_provider_tool(&self) -> Tool {
        Tool {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

// ---------------------------------------------------------------------------
// ToolRegistry
// ---------------------------------------------------------------------------

/// Fixed name → descriptor table. Built once, then shared read-only.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `descriptor`, replacing and returning any tool with the same name.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Option<ToolDescriptor> {
        debug!(tool = descriptor.name, "registered tool");
        match self.index.get(descriptor.name) {
            Some(&i) => Some(std::mem::replace(&mut self.tools[i], descriptor)),
            None => {
                self.index.insert(descriptor.name, self.tools.len());
                self.tools.push(descriptor);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions advertised to the model, in registration order.
    pub fn to_provider_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(ToolDescriptor::to_provider_tool).collect()
    }

    /// Resolve, validate and run one tool call.
    pub async fn invoke(
        &self,
        name: &str,
        ctx: ToolContext<'_>,
        raw_args: &Value,
    ) -> Result<Value, ToolError> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args = resolve_args(&descriptor.params, raw_args)?;
        let output = descriptor.handler.call(ctx, &args).await?;
        if !descriptor.returns.matches(&output) {
            return Err(ToolError::Shape(format!(
                "tool '{name}' returned {} where {:?} was declared",
                describe_json(&output),
                descriptor.returns
            )));
        }
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

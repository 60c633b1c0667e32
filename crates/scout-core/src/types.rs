use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// RepoKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid repository identifier '{input}': {reason}")]
pub struct InvalidRepoKey {
    pub input: String,
    pub reason: &'static str,
}

/// A validated `owner/name` repository identifier.
///
/// Owners follow GitHub login rules (ASCII alphanumerics and `-`), names may
/// additionally contain `_` and `.`. Because an owner never contains `_`,
/// [`RepoKey::file_token`] is injective.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoKey {
    owner: String,
    name: String,
}

impl RepoKey {
    pub fn parse(input: &str) -> Result<Self, InvalidRepoKey> {
        let invalid = |reason| InvalidRepoKey {
            input: input.to_string(),
            reason,
        };

        let (owner, name) = input
            .trim()
            .split_once('/')
            .ok_or_else(|| invalid("expected the form owner/name"))?;

        if owner.is_empty() || name.is_empty() {
            return Err(invalid("owner and name must both be non-empty"));
        }
        if !owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(invalid("owner may only contain ASCII letters, digits and '-'"));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid(
                "name may only contain ASCII letters, digits, '-', '_' and '.'",
            ));
        }
        if name == "." || name == ".." {
            return Err(invalid("name may not be '.' or '..'"));
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filesystem-safe token used to name the per-repository history file.
    pub fn file_token(&self) -> String {
        format!("{}_{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoKey {
    type Err = InvalidRepoKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoKey {
    type Error = InvalidRepoKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepoKey> for String {
    fn from(key: RepoKey) -> Self {
        key.to_string()
    }
}

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

/// Per-conversation credential and repository scope.
///
/// Built once when a conversation starts and never mutated afterwards.
#[derive(Clone)]
pub struct SessionContext {
    credential: String,
    repo: RepoKey,
}

impl SessionContext {
    pub fn new(credential: impl Into<String>, repo: RepoKey) -> Self {
        Self {
            credential: credential.into(),
            repo,
        }
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn repo(&self) -> &RepoKey {
        &self.repo
    }
}

// The credential must never end up in logs.
impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("credential", &"<redacted>")
            .field("repo", &self.repo)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// StructuredResult
// ---------------------------------------------------------------------------

/// The validated answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredResult {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<String>,
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// HistoryMessage
// ---------------------------------------------------------------------------

/// One turn of a conversation, in the order it happened.
///
/// The sequence is replayed verbatim to the model on the next query, so
/// reordering entries changes what the model remembers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum HistoryMessage {
    User {
        content: String,
        timestamp: DateTime<Utc>,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<StructuredResult>,
        timestamp: DateTime<Utc>,
    },
    ToolCall {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
    ToolResult {
        call_id: String,
        tool_name: String,
        content: serde_json::Value,
        timestamp: DateTime<Utc>,
    },
}

impl HistoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        HistoryMessage::User {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        HistoryMessage::Assistant {
            content: content.into(),
            result: None,
            timestamp: Utc::now(),
        }
    }

    /// The closing assistant turn of a query, carrying the validated result.
    pub fn final_answer(result: StructuredResult) -> Self {
        HistoryMessage::Assistant {
            content: result.answer.clone(),
            result: Some(result),
            timestamp: Utc::now(),
        }
    }

    pub fn tool_call(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        HistoryMessage::ToolCall {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
            timestamp: Utc::now(),
        }
    }

    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        HistoryMessage::ToolResult {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content,
            timestamp: Utc::now(),
        }
    }

    /// Role label as written to disk.
    pub fn role(&self) -> &'static str {
        match self {
            HistoryMessage::User { .. } => "user",
            HistoryMessage::Assistant { .. } => "assistant",
            HistoryMessage::ToolCall { .. } => "tool-call",
            HistoryMessage::ToolResult { .. } => "tool-result",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HistoryMessage::User { timestamp, .. }
            | HistoryMessage::Assistant { timestamp, .. }
            | HistoryMessage::ToolCall { timestamp, .. }
            | HistoryMessage::ToolResult { timestamp, .. } => *timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Agent orchestration for repo-scout.
//!
//! A query flows through the [`context::ContextComposer`] (once per session),
//! the [`engine::ConversationEngine`] (model round trips and tool calls), and
//! the [`validator`] before it reaches the caller. [`assistant::RepoAssistant`]
//! ties those together with durable per-repository history.

pub mod assistant;
pub mod context;
pub mod cost;
pub mod engine;
pub mod llm;
pub mod render;
pub mod validator;

pub use assistant::{Analysis, Answer, RepoAssistant, RepoSession};
pub use context::ContextComposer;
pub use cost::{ModelPricing, UsageTracker};
pub use engine::{ConversationEngine, EngineConfig, EngineRun, ToolInvocationRecord};
pub use llm::{MockProvider, OpenAiProvider};
pub use scout_core::history::{load_history, save_history};
pub use validator::ResultValidationError;

use scout_core::data_source::DataSourceError;
use scout_core::types::InvalidRepoKey;
use scout_core::ErrorKind;
use scout_harness::provider::ProviderError;
use scout_harness::ToolError;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Crate-level error type
// ---------------------------------------------------------------------------

/// Why a query produced no result.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid repository: {0}")]
    InvalidRepo(#[from] InvalidRepoKey),

    #[error("model backend error: {0}")]
    Provider(#[from] ProviderError),

    #[error("tool '{tool}' failed: {source}")]
    Tool {
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("repository data error: {0}")]
    Source(#[from] DataSourceError),

    #[error("invalid final answer: {0}")]
    InvalidResult(#[from] ResultValidationError),

    #[error("no final answer after {limit} model round trips")]
    IterationLimit { limit: u32 },

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::InvalidRepo(_) | AgentError::InvalidResult(_) => ErrorKind::Validation,
            AgentError::Provider(e) => e.kind(),
            AgentError::Tool { source, .. } => source.kind(),
            AgentError::Source(e) => e.kind(),
            AgentError::IterationLimit { .. } | AgentError::Runtime(_) => ErrorKind::Internal,
        }
    }
}

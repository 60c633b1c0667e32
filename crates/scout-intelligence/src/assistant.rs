//! Entry points for presentation layers.
//!
//! [`RepoAssistant`] owns the shared pieces (engine, composer, store). It
//! offers a stateless [`analyze`](RepoAssistant::analyze) call and
//! per-repository [`RepoSession`]s that load, extend and persist history.

use std::sync::Arc;

use tracing::{info, warn};

use scout_core::data_source::{RepoDataSource, RepositoryInfo};
use scout_core::history::{HistoryStore, HistoryStoreError};
use scout_core::{HistoryMessage, RepoKey, SessionContext, StructuredResult};
use scout_harness::provider::LlmProvider;
use scout_harness::repo_tools::default_registry;

use crate::context::ContextComposer;
use crate::cost::UsageTracker;
use crate::engine::{block_on, ConversationEngine, EngineConfig, ToolInvocationRecord};
use crate::AgentError;

/// Result of a stateless [`RepoAssistant::analyze`] call.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub result: StructuredResult,
    /// The supplied history plus this query's turns.
    pub history: Vec<HistoryMessage>,
    pub invocations: Vec<ToolInvocationRecord>,
    pub usage: UsageTracker,
}

/// Result of one [`RepoSession::ask`].
#[derive(Debug, Clone)]
pub struct Answer {
    pub result: StructuredResult,
    pub invocations: Vec<ToolInvocationRecord>,
    pub usage: UsageTracker,
}

pub struct RepoAssistant {
    engine: ConversationEngine,
    composer: ContextComposer,
    store: HistoryStore,
}

impl RepoAssistant {
    /// Assistant over the eight repository tools.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        source: Arc<dyn RepoDataSource>,
        store: HistoryStore,
    ) -> Self {
        Self {
            engine: ConversationEngine::new(provider, Arc::new(default_registry()), source),
            composer: ContextComposer::new(),
            store,
        }
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = self.engine.with_config(config);
        self
    }

    pub fn with_composer(mut self, composer: ContextComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub async fn list_repositories(
        &self,
        credential: &str,
        user: Option<&str>,
    ) -> Result<Vec<RepositoryInfo>, AgentError> {
        Ok(self
            .engine
            .source()
            .list_repositories(credential, user)
            .await?)
    }

    /// Answer one query. Nothing is loaded or persisted; pass `history` to
    /// continue an earlier conversation.
    pub async fn analyze(
        &self,
        query: &str,
        credential: &str,
        repo: &str,
        history: Option<&[HistoryMessage]>,
    ) -> Result<Analysis, AgentError> {
        let ctx = SessionContext::new(credential, RepoKey::parse(repo)?);
        let instructions = self
            .composer
            .compose(self.engine.source().as_ref(), &ctx)
            .await;
        let run = self
            .engine
            .run(&instructions, &ctx, query, history.unwrap_or_default())
            .await?;
        Ok(Analysis {
            result: run.result,
            history: run.history,
            invocations: run.invocations,
            usage: run.usage,
        })
    }

    /// Blocking form of [`analyze`](Self::analyze); must not be called from
    /// inside an async runtime.
    pub fn analyze_blocking(
        &self,
        query: &str,
        credential: &str,
        repo: &str,
        history: Option<&[HistoryMessage]>,
    ) -> Result<Analysis, AgentError> {
        block_on(self.analyze(query, credential, repo, history))?
    }

    /// Start a conversation: compose instructions once and load any
    /// persisted history for `repo`.
    pub async fn open_session(
        &self,
        credential: &str,
        repo: &str,
    ) -> Result<RepoSession<'_>, AgentError> {
        let ctx = SessionContext::new(credential, RepoKey::parse(repo)?);
        let instructions = self
            .composer
            .compose(self.engine.source().as_ref(), &ctx)
            .await;
        let history = self.store.load(ctx.repo());
        info!(repo = %ctx.repo(), messages = history.len(), "session opened");
        Ok(RepoSession {
            assistant: self,
            ctx,
            instructions,
            history,
            usage: UsageTracker::new(),
        })
    }

    pub fn open_session_blocking(
        &self,
        credential: &str,
        repo: &str,
    ) -> Result<RepoSession<'_>, AgentError> {
        block_on(self.open_session(credential, repo))?
    }
}

/// One conversation about one repository.
///
/// Queries on a session run one at a time (`ask` takes `&mut self`).
pub struct RepoSession<'a> {
    assistant: &'a RepoAssistant,
    ctx: SessionContext,
    instructions: String,
    history: Vec<HistoryMessage>,
    usage: UsageTracker,
}

impl RepoSession<'_> {
    pub fn repo(&self) -> &RepoKey {
        self.ctx.repo()
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn history(&self) -> &[HistoryMessage] {
        &self.history
    }

    /// Usage accumulated by this session's queries.
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Answer `query`, append its turns to the history and persist it.
    ///
    /// A failed query leaves the history untouched. A failed save is logged
    /// and does not undo the in-memory update.
    pub async fn ask(&mut self, query: &str) -> Result<Answer, AgentError> {
        let run = self
            .assistant
            .engine
            .run(&self.instructions, &self.ctx, query, &self.history)
            .await?;
        self.history = run.history;
        self.usage.merge(&run.usage);

        if let Err(e) = self.assistant.store.save(self.ctx.repo(), &self.history) {
            warn!(repo = %self.ctx.repo(), error = %e, "failed to persist history");
        }

        Ok(Answer {
            result: run.result,
            invocations: run.invocations,
            usage: run.usage,
        })
    }

    pub fn ask_blocking(&mut self, query: &str) -> Result<Answer, AgentError> {
        block_on(self.ask(query))?
    }

    /// Forget the conversation: the in-memory history is cleared first, then
    /// the persisted copy is removed. Returns whether a file was removed.
    pub fn clear(&mut self) -> Result<bool, HistoryStoreError> {
        self.history.clear();
        self.assistant.store.delete(self.ctx.repo())
    }
}

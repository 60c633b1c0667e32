//! Per-conversation system instructions.
//!
//! The static base text is shared by every conversation. At session start the
//! composer tries to append live repository facts; if that lookup fails for
//! any reason it appends a one-line fallback naming the repository instead.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use scout_core::data_source::{RepoDataSource, RepositoryInfo};
use scout_core::{RepoKey, SessionContext};
use scout_harness::repo_tools::FINAL_RESULT_TOOL;

const BASE_INSTRUCTIONS: &str = "\
You are a GitHub Repository Analysis Assistant specialized in answering questions about a single GitHub repository.

As an assistant:
1. Always be specific, accurate, and helpful
2. When uncertain, acknowledge limitations rather than making assumptions
3. Refer to specific files, issues, or commits when possible
4. Structure your responses to be easy to read and understand
5. Focus on providing factual information based on the repository data

Use the repository tools when the question needs repository-specific facts, and search thoroughly when it does.
Use tools only when necessary: if the question is generic and you can answer it on your own, do not call a tool.";

/// Builds the system instructions for a conversation.
#[derive(Debug, Clone)]
pub struct ContextComposer {
    base: String,
}

impl Default for ContextComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextComposer {
    pub fn new() -> Self {
        Self {
            base: format!(
                "{BASE_INSTRUCTIONS}\n\n\
                 When you are done, call the `{FINAL_RESULT_TOOL}` tool exactly once with your \
                 answer, the sources supporting it (file paths, issue numbers, commit SHAs or \
                 URLs), and your confidence between 0.0 and 1.0."
            ),
        }
    }

    /// Replace the static base text.
    pub fn with_base(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    pub fn base_instructions(&self) -> &str {
        &self.base
    }

    /// Instructions for `ctx`, enriched with live repository metadata.
    /// Never fails.
    pub async fn compose(&self, source: &dyn RepoDataSource, ctx: &SessionContext) -> String {
        self.compose_at(source, ctx, Utc::now()).await
    }

    /// As [`compose`](Self::compose), with an explicit clock.
    pub async fn compose_at(
        &self,
        source: &dyn RepoDataSource,
        ctx: &SessionContext,
        now: DateTime<Utc>,
    ) -> String {
        let section = match source.get_repository(ctx).await {
            Ok(info) => {
                info!(repo = %ctx.repo(), "repository context loaded");
                repository_section(ctx.repo(), &info, now)
            }
            Err(e) => {
                warn!(repo = %ctx.repo(), error = %e, "repository context unavailable; using fallback");
                fallback_section(ctx.repo())
            }
        };
        format!("{}\n\n{section}", self.base)
    }
}

/// The degraded context: only the repository identifier.
pub fn fallback_section(repo: &RepoKey) -> String {
    format!("You are currently answering questions about the repository: {repo}")
}

fn repository_section(repo: &RepoKey, info: &RepositoryInfo, now: DateTime<Utc>) -> String {
    let updated = info
        .updated_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "If you need additional information from the repository to answer the question, here is the repository info.\n\
         \n\
         Repository name: {repo}\n\
         Repository details:\n\
         - Description: {}\n\
         - Primary language: {}\n\
         - Stars: {}\n\
         - Forks: {}\n\
         - Last updated: {updated}\n\
         \n\
         Today's date is {} and the time now is {} UTC.",
        info.description.as_deref().unwrap_or("No description provided"),
        info.language.as_deref().unwrap_or("Not specified"),
        info.stargazers_count,
        info.forks_count,
        now.format("%Y-%m-%d"),
        now.format("%H:%M:%S"),
    )
}

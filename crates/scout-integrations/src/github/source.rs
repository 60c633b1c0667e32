use std::sync::Mutex;

use async_trait::async_trait;
use octocrab::Octocrab;
use tracing::debug;

use scout_core::data_source::{
    CodeMatch, CommitRecord, IssueRecord, IssueStateFilter, RepoContent, RepoDataSource,
    RepositoryInfo, Result,
};
use scout_core::SessionContext;

use super::client::GitHubClient;
use super::{commits, contents, issues, repos, search};

/// Pages fetched per listing call unless configured otherwise.
pub const DEFAULT_MAX_PAGES: u32 = 3;

/// [`RepoDataSource`] backed by the GitHub REST API.
///
/// The octocrab instance for the most recently used credential is kept and
/// reused while the credential stays the same.
pub struct GitHubDataSource {
    max_pages: u32,
    cached: Mutex<Option<(String, Octocrab)>>,
}

impl Default for GitHubDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubDataSource {
    pub fn new() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            cached: Mutex::new(None),
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    fn octocrab(&self, credential: &str) -> Result<Octocrab> {
        let mut slot = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((token, octo)) = slot.as_ref() {
            if token == credential {
                return Ok(octo.clone());
            }
        }
        debug!("building GitHub client for new credential");
        let octo = GitHubClient::authenticate(credential)?;
        *slot = Some((credential.to_string(), octo.clone()));
        Ok(octo)
    }

    fn client(&self, ctx: &SessionContext) -> Result<GitHubClient> {
        Ok(GitHubClient::new(self.octocrab(ctx.credential())?, ctx.repo()))
    }
}

#[async_trait]
impl RepoDataSource for GitHubDataSource {
    async fn list_repositories(
        &self,
        credential: &str,
        user: Option<&str>,
    ) -> Result<Vec<RepositoryInfo>> {
        let octo = self.octocrab(credential)?;
        Ok(repos::list_repositories(&octo, user, self.max_pages).await?)
    }

    async fn get_repository(&self, ctx: &SessionContext) -> Result<RepositoryInfo> {
        Ok(repos::get_repository(&self.client(ctx)?).await?)
    }

    async fn search_code(&self, ctx: &SessionContext, query: &str) -> Result<Vec<CodeMatch>> {
        Ok(search::search_code(&self.client(ctx)?, query).await?)
    }

    async fn list_issues(
        &self,
        ctx: &SessionContext,
        state: IssueStateFilter,
    ) -> Result<Vec<IssueRecord>> {
        Ok(issues::list_issues(&self.client(ctx)?, state, self.max_pages).await?)
    }

    async fn list_commits(
        &self,
        ctx: &SessionContext,
        path: Option<&str>,
    ) -> Result<Vec<CommitRecord>> {
        Ok(commits::list_commits(&self.client(ctx)?, path, self.max_pages).await?)
    }

    async fn get_content(&self, ctx: &SessionContext, path: &str) -> Result<RepoContent> {
        Ok(contents::get_content(&self.client(ctx)?, path).await?)
    }
}

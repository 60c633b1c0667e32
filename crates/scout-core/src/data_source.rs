//! Read-only interface to the remote repository host.
//!
//! The assistant never talks to GitHub directly; it goes through
//! [`RepoDataSource`], implemented for real in `scout-integrations` and by an
//! in-memory fixture in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ErrorKind;
use crate::types::SessionContext;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum DataSourceError {
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("upstream error: {0}")]
    Upstream(String),
}

impl DataSourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataSourceError::Unauthorized(_) => ErrorKind::Authentication,
            DataSourceError::NotFound(_) => ErrorKind::NotFound,
            DataSourceError::Transient(_) => ErrorKind::Transient,
            DataSourceError::Upstream(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, DataSourceError>;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub clone_url: Option<String>,
    pub language: Option<String>,
    pub private: bool,
    pub size: u64,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeMatch {
    pub name: String,
    pub path: String,
    pub url: String,
    pub repository: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: String,
    pub labels: Vec<String>,
    pub comments: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitStats {
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub html_url: String,
    pub message: String,
    pub author: Option<String>,
    pub committer: Option<String>,
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<CommitStats>,
}

/// One entry returned by the contents API.
///
/// `kind` carries the host's type tag verbatim (`file`, `dir`, `symlink`,
/// `submodule`); `content` is only populated for decoded text files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: u64,
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ContentItem {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

/// Whatever a path resolved to: a single item, or a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepoContent {
    Item(ContentItem),
    Listing(Vec<ContentItem>),
}

// ---------------------------------------------------------------------------
// IssueStateFilter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStateFilter {
    Open,
    Closed,
    #[default]
    All,
}

impl IssueStateFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueStateFilter::Open => "open",
            IssueStateFilter::Closed => "closed",
            IssueStateFilter::All => "all",
        }
    }
}

impl fmt::Display for IssueStateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStateFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(IssueStateFilter::Open),
            "closed" => Ok(IssueStateFilter::Closed),
            "all" => Ok(IssueStateFilter::All),
            other => Err(format!(
                "unknown issue state '{other}' (expected open, closed or all)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// RepoDataSource
// ---------------------------------------------------------------------------

/// Read operations the assistant may perform against a repository host.
///
/// Every call may fail with a [`DataSourceError`]; none of them mutate the
/// remote repository.
#[async_trait]
pub trait RepoDataSource: Send + Sync {
    /// Repositories owned by `user`, or by the authenticated user when `None`.
    async fn list_repositories(
        &self,
        credential: &str,
        user: Option<&str>,
    ) -> Result<Vec<RepositoryInfo>>;

    async fn get_repository(&self, ctx: &SessionContext) -> Result<RepositoryInfo>;

    async fn search_code(&self, ctx: &SessionContext, query: &str) -> Result<Vec<CodeMatch>>;

    async fn list_issues(
        &self,
        ctx: &SessionContext,
        state: IssueStateFilter,
    ) -> Result<Vec<IssueRecord>>;

    async fn list_commits(
        &self,
        ctx: &SessionContext,
        path: Option<&str>,
    ) -> Result<Vec<CommitRecord>>;

    /// Resolve `path` (empty for the repository root).
    async fn get_content(&self, ctx: &SessionContext, path: &str) -> Result<RepoContent>;
}

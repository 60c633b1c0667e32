//! Wire shapes of the GitHub REST responses we read, and their conversion
//! into the core record types.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use scout_core::data_source::{CodeMatch, CommitRecord, CommitStats, ContentItem, RepositoryInfo};

#[derive(Debug, Clone, Deserialize)]
pub struct RawRepository {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<RawRepository> for RepositoryInfo {
    fn from(r: RawRepository) -> Self {
        Self {
            name: r.name,
            full_name: r.full_name,
            description: r.description,
            html_url: r.html_url,
            clone_url: r.clone_url,
            language: r.language,
            private: r.private,
            size: r.size,
            stargazers_count: r.stargazers_count,
            forks_count: r.forks_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRepoRef {
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCodeItem {
    pub name: String,
    pub path: String,
    pub html_url: String,
    pub repository: RawRepoRef,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCodeSearch {
    #[serde(default)]
    pub items: Vec<RawCodeItem>,
}

impl From<RawCodeItem> for CodeMatch {
    fn from(c: RawCodeItem) -> Self {
        Self {
            name: c.name,
            path: c.path,
            url: c.html_url,
            repository: c.repository.full_name,
            score: c.score,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGitActor {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCommitDetail {
    pub message: String,
    #[serde(default)]
    pub author: Option<RawGitActor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCommitStats {
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCommit {
    pub sha: String,
    pub html_url: String,
    pub commit: RawCommitDetail,
    /// GitHub account of the author; absent when the email is not linked.
    #[serde(default)]
    pub author: Option<RawUser>,
    #[serde(default)]
    pub committer: Option<RawUser>,
    #[serde(default)]
    pub stats: Option<RawCommitStats>,
}

impl From<RawCommit> for CommitRecord {
    fn from(c: RawCommit) -> Self {
        Self {
            sha: c.sha,
            html_url: c.html_url,
            date: c.commit.author.and_then(|a| a.date),
            message: c.commit.message,
            author: c.author.map(|u| u.login),
            committer: c.committer.map(|u| u.login),
            stats: c.stats.map(|s| CommitStats {
                additions: s.additions,
                deletions: s.deletions,
                total: s.total,
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawContent {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl From<RawContent> for ContentItem {
    fn from(c: RawContent) -> Self {
        Self {
            name: c.name,
            path: c.path,
            kind: c.kind,
            size: c.size,
            url: c.html_url,
            content: None,
        }
    }
}

/// The contents endpoint answers with an object for a file and an array for
/// a directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawContentResponse {
    Listing(Vec<RawContent>),
    Single(RawContent),
}

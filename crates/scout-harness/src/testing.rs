//! In-memory [`RepoDataSource`] for tests.
//!
//! Enabled for this crate's own tests and, through the `test-util` feature,
//! for downstream crates.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use scout_core::data_source::{
    CodeMatch, CommitRecord, ContentItem, DataSourceError, IssueRecord, IssueStateFilter,
    RepoContent, RepoDataSource, RepositoryInfo, Result,
};
use scout_core::SessionContext;

pub fn issue(number: u64, title: &str, state: &str, labels: &[&str]) -> IssueRecord {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default();
    IssueRecord {
        number,
        title: title.to_string(),
        state: state.to_string(),
        html_url: format!("https://github.com/octo/widgets/issues/{number}"),
        created_at: at,
        updated_at: at,
        user: "octocat".to_string(),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        comments: 0,
    }
}

pub fn commit(sha: &str, message: &str) -> CommitRecord {
    CommitRecord {
        sha: sha.to_string(),
        html_url: format!("https://github.com/octo/widgets/commit/{sha}"),
        message: message.to_string(),
        author: Some("octocat".to_string()),
        committer: Some("octocat".to_string()),
        date: Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).single(),
        stats: None,
    }
}

fn item(path: &str, kind: &str, content: Option<&str>) -> ContentItem {
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    ContentItem {
        name,
        path: path.to_string(),
        kind: kind.to_string(),
        size: content.map(|c| c.len() as u64).unwrap_or(0),
        url: None,
        content: content.map(str::to_string),
    }
}

/// Scripted repository data plus a log of the calls made against it.
pub struct FixtureSource {
    repo: RepositoryInfo,
    repositories: Vec<RepositoryInfo>,
    code_matches: Vec<CodeMatch>,
    issues: Vec<IssueRecord>,
    commits: Vec<CommitRecord>,
    contents: HashMap<String, RepoContent>,
    failure: Option<DataSourceError>,
    calls: Mutex<Vec<String>>,
}

impl FixtureSource {
    pub fn new(full_name: &str) -> Self {
        let name = full_name.rsplit('/').next().unwrap_or(full_name).to_string();
        let repo = RepositoryInfo {
            name,
            full_name: full_name.to_string(),
            description: Some("Widgets for everyone".to_string()),
            html_url: format!("https://github.com/{full_name}"),
            clone_url: None,
            language: Some("Rust".to_string()),
            private: false,
            size: 1024,
            stargazers_count: 42,
            forks_count: 7,
            created_at: Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).single(),
            updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).single(),
        };
        Self {
            repositories: vec![repo.clone()],
            repo,
            code_matches: Vec::new(),
            issues: Vec::new(),
            commits: Vec::new(),
            contents: HashMap::new(),
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_repository(mut self, repo: RepositoryInfo) -> Self {
        self.repositories = vec![repo.clone()];
        self.repo = repo;
        self
    }

    pub fn with_issues(mut self, issues: Vec<IssueRecord>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_commits(mut self, commits: Vec<CommitRecord>) -> Self {
        self.commits = commits;
        self
    }

    pub fn with_code_matches(mut self, matches: Vec<CodeMatch>) -> Self {
        self.code_matches = matches;
        self
    }

    pub fn with_content(mut self, path: &str, content: RepoContent) -> Self {
        self.contents.insert(path.to_string(), content);
        self
    }

    pub fn with_file(self, path: &str, text: &str) -> Self {
        self.with_content(path, RepoContent::Item(item(path, "file", Some(text))))
    }

    /// Entries whose last segment contains a `.` are files, the rest directories.
    pub fn with_dir(self, path: &str, entries: &[&str]) -> Self {
        let listing = entries
            .iter()
            .map(|&e| {
                let last = e.rsplit('/').next().unwrap_or(e);
                let kind = if last.contains('.') { "file" } else { "dir" };
                item(e, kind, None)
            })
            .collect();
        self.with_content(path, RepoContent::Listing(listing))
    }

    /// Every call fails with `error`.
    pub fn failing(mut self, error: DataSourceError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Calls made so far, as `operation[:argument]`.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RepoDataSource for FixtureSource {
    async fn list_repositories(
        &self,
        _credential: &str,
        user: Option<&str>,
    ) -> Result<Vec<RepositoryInfo>> {
        self.record(format!("list_repositories:{}", user.unwrap_or("-")))?;
        Ok(self.repositories.clone())
    }

    async fn get_repository(&self, ctx: &SessionContext) -> Result<RepositoryInfo> {
        self.record("get_repository".to_string())?;
        if ctx.repo().to_string() != self.repo.full_name {
            return Err(DataSourceError::NotFound(format!(
                "repository {} not found",
                ctx.repo()
            )));
        }
        Ok(self.repo.clone())
    }

    async fn search_code(&self, _ctx: &SessionContext, query: &str) -> Result<Vec<CodeMatch>> {
        self.record(format!("search_code:{query}"))?;
        Ok(self.code_matches.clone())
    }

    async fn list_issues(
        &self,
        _ctx: &SessionContext,
        state: IssueStateFilter,
    ) -> Result<Vec<IssueRecord>> {
        self.record(format!("list_issues:{state}"))?;
        Ok(self
            .issues
            .iter()
            .filter(|i| state == IssueStateFilter::All || i.state == state.as_str())
            .cloned()
            .collect())
    }

    async fn list_commits(
        &self,
        _ctx: &SessionContext,
        path: Option<&str>,
    ) -> Result<Vec<CommitRecord>> {
        self.record(format!("list_commits:{}", path.unwrap_or("-")))?;
        Ok(self.commits.clone())
    }

    async fn get_content(&self, _ctx: &SessionContext, path: &str) -> Result<RepoContent> {
        self.record(format!("get_content:{path}"))?;
        self.contents
            .get(path)
            .cloned()
            .ok_or_else(|| DataSourceError::NotFound(format!("no content at '{path}'")))
    }
}

use octocrab::Octocrab;
use thiserror::Error;

use scout_core::data_source::DataSourceError;
use scout_core::RepoKey;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("missing GitHub token")]
    MissingToken,

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

pub type Result<T> = std::result::Result<T, GitHubError>;

impl From<GitHubError> for DataSourceError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Api(e) => classify(&e),
            GitHubError::MissingToken => DataSourceError::Unauthorized(err.to_string()),
            GitHubError::Unexpected(msg) => DataSourceError::Upstream(msg),
        }
    }
}

/// Map an octocrab failure onto the data-source taxonomy by HTTP status.
/// Anything that never reached GitHub is treated as a network failure.
fn classify(err: &octocrab::Error) -> DataSourceError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let message = source.message.clone();
            match source.status_code.as_u16() {
                401 => DataSourceError::Unauthorized(message),
                403 if message.to_lowercase().contains("rate limit") => {
                    DataSourceError::Transient(message)
                }
                403 => DataSourceError::Unauthorized(message),
                404 => DataSourceError::NotFound(message),
                429 | 500..=599 => DataSourceError::Transient(message),
                status => DataSourceError::Upstream(format!("{status}: {message}")),
            }
        }
        other => DataSourceError::Transient(other.to_string()),
    }
}

/// Authenticated client scoped to one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    pub(crate) octocrab: Octocrab,
    pub(crate) owner: String,
    pub(crate) repo: String,
}

impl GitHubClient {
    pub fn new(octocrab: Octocrab, repo: &RepoKey) -> Self {
        Self {
            octocrab,
            owner: repo.owner().to_string(),
            repo: repo.name().to_string(),
        }
    }

    /// Build an octocrab instance authenticated with a personal access token.
    pub fn authenticate(token: &str) -> Result<Octocrab> {
        if token.trim().is_empty() {
            return Err(GitHubError::MissingToken);
        }
        Ok(Octocrab::builder()
            .personal_token(token.to_string())
            .build()?)
    }

    pub fn inner(&self) -> &Octocrab {
        &self.octocrab
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// `/repos/{owner}/{repo}` followed by `suffix`.
    pub(crate) fn route(&self, suffix: &str) -> String {
        format!(
            "/repos/{}/{}{}",
            urlencoding::encode(&self.owner),
            urlencoding::encode(&self.repo),
            suffix
        )
    }
}

/// Percent-encode each segment of a repository path, keeping the slashes.
pub(crate) fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

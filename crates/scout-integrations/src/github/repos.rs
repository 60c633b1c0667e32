use octocrab::Octocrab;

use scout_core::data_source::RepositoryInfo;

use crate::types::RawRepository;

use super::client::{GitHubClient, Result};

const PER_PAGE: u32 = 100;

/// Metadata for the client's repository.
pub async fn get_repository(client: &GitHubClient) -> Result<RepositoryInfo> {
    let raw: RawRepository = client.octocrab.get(client.route(""), None::<&()>).await?;
    Ok(raw.into())
}

/// Repositories of `user`, or of the authenticated user when `None`.
pub async fn list_repositories(
    octocrab: &Octocrab,
    user: Option<&str>,
    max_pages: u32,
) -> Result<Vec<RepositoryInfo>> {
    let route = match user {
        Some(u) => format!("/users/{}/repos", urlencoding::encode(u)),
        None => "/user/repos".to_string(),
    };

    let mut out = Vec::new();
    for page in 1..=max_pages.max(1) {
        let params = [("per_page", PER_PAGE), ("page", page)];
        let batch: Vec<RawRepository> = octocrab.get(&route, Some(&params)).await?;
        let done = batch.len() < PER_PAGE as usize;
        out.extend(batch.into_iter().map(RepositoryInfo::from));
        if done {
            break;
        }
    }
    Ok(out)
}

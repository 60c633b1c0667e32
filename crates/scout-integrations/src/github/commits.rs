use serde::Serialize;

use scout_core::data_source::CommitRecord;

use crate::types::RawCommit;

use super::client::{GitHubClient, Result};

const PER_PAGE: u32 = 100;

#[derive(Serialize)]
struct CommitParams<'a> {
    per_page: u32,
    page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
}

/// Commit history of the default branch, optionally limited to `path`.
pub async fn list_commits(
    client: &GitHubClient,
    path: Option<&str>,
    max_pages: u32,
) -> Result<Vec<CommitRecord>> {
    let route = client.route("/commits");
    let path = path.filter(|p| !p.trim().is_empty());

    let mut out = Vec::new();
    for page in 1..=max_pages.max(1) {
        let params = CommitParams {
            per_page: PER_PAGE,
            page,
            path,
        };
        let batch: Vec<RawCommit> = client.octocrab.get(&route, Some(&params)).await?;
        let done = batch.len() < PER_PAGE as usize;
        out.extend(batch.into_iter().map(CommitRecord::from));
        if done {
            break;
        }
    }
    Ok(out)
}

use scout_core::data_source::CodeMatch;

use crate::types::RawCodeSearch;

use super::client::{GitHubClient, Result};

/// Code search scoped to the client's repository (first page of results).
pub async fn search_code(client: &GitHubClient, query: &str) -> Result<Vec<CodeMatch>> {
    let q = format!("{query} repo:{}/{}", client.owner, client.repo);
    let params = [("q", q.as_str()), ("per_page", "100")];
    let raw: RawCodeSearch = client
        .octocrab
        .get("/search/code", Some(&params))
        .await?;
    Ok(raw.items.into_iter().map(CodeMatch::from).collect())
}

use base64::{engine::general_purpose::STANDARD, Engine as _};

use scout_core::data_source::{ContentItem, RepoContent};

use crate::types::{RawContent, RawContentResponse};

use super::client::{encode_path, GitHubClient, GitHubError, Result};

/// Resolve `path` (empty for the root) to a file or a directory listing.
pub async fn get_content(client: &GitHubClient, path: &str) -> Result<RepoContent> {
    let encoded = encode_path(path);
    let route = if encoded.is_empty() {
        client.route("/contents")
    } else {
        client.route(&format!("/contents/{encoded}"))
    };

    let raw: RawContentResponse = client.octocrab.get(&route, None::<&()>).await?;
    match raw {
        RawContentResponse::Single(item) => Ok(RepoContent::Item(decode_item(item)?)),
        RawContentResponse::Listing(items) => Ok(RepoContent::Listing(
            items.into_iter().map(ContentItem::from).collect(),
        )),
    }
}

/// Decode the base64 body of a file; binary files keep `content: None`.
fn decode_item(raw: RawContent) -> Result<ContentItem> {
    let encoded = match (&raw.encoding, &raw.content) {
        (Some(enc), Some(body)) if enc == "base64" => Some(body.replace(['\n', '\r'], "")),
        _ => None,
    };
    let mut item = ContentItem::from(raw);
    if let Some(body) = encoded {
        let bytes = STANDARD
            .decode(body)
            .map_err(|e| GitHubError::Unexpected(format!("invalid base64 in {}: {e}", item.path)))?;
        item.content = String::from_utf8(bytes).ok();
    }
    Ok(item)
}

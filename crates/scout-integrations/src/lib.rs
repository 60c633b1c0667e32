pub mod github;
pub mod types;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use scout_core::data_source::{
        CodeMatch, CommitRecord, ContentItem, DataSourceError, RepoDataSource, RepositoryInfo,
    };
    use scout_core::{RepoKey, SessionContext};

    use crate::github::client::GitHubClient;
    use crate::github::GitHubDataSource;
    use crate::types::*;

    // ---- Wire conversions ----

    #[test]
    fn repository_from_wire() {
        let raw: RawRepository = serde_json::from_value(json!({
            "name": "widgets",
            "full_name": "octo/widgets",
            "description": null,
            "html_url": "https://github.com/octo/widgets",
            "clone_url": "https://github.com/octo/widgets.git",
            "language": "Rust",
            "private": false,
            "size": 120,
            "stargazers_count": 5,
            "forks_count": 1,
            "created_at": "2023-01-01T00:00:00Z",
            "updated_at": "2024-06-01T12:00:00Z",
            "owner": {"login": "octo"}
        }))
        .unwrap();
        let info = RepositoryInfo::from(raw);
        assert_eq!(info.full_name, "octo/widgets");
        assert_eq!(info.language.as_deref(), Some("Rust"));
        assert!(info.description.is_none());
        assert_eq!(info.stargazers_count, 5);
        assert!(info.updated_at.is_some());
    }

    #[test]
    fn commit_from_wire_without_linked_author() {
        let raw: RawCommit = serde_json::from_value(json!({
            "sha": "abc123",
            "html_url": "https://github.com/octo/widgets/commit/abc123",
            "commit": {
                "message": "Fix null pointer",
                "author": {"name": "Dev", "email": "dev@example.com", "date": "2024-02-01T10:00:00Z"}
            },
            "author": null,
            "committer": {"login": "web-flow"}
        }))
        .unwrap();
        let commit = CommitRecord::from(raw);
        assert_eq!(commit.message, "Fix null pointer");
        assert!(commit.author.is_none());
        assert_eq!(commit.committer.as_deref(), Some("web-flow"));
        assert!(commit.date.is_some());
        assert!(commit.stats.is_none());
    }

    #[test]
    fn code_search_from_wire() {
        let raw: RawCodeSearch = serde_json::from_value(json!({
            "total_count": 1,
            "items": [{
                "name": "lib.rs",
                "path": "src/lib.rs",
                "html_url": "https://github.com/octo/widgets/blob/main/src/lib.rs",
                "repository": {"full_name": "octo/widgets"},
                "score": 1.0
            }]
        }))
        .unwrap();
        let matches: Vec<CodeMatch> = raw.items.into_iter().map(CodeMatch::from).collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].repository, "octo/widgets");
        assert_eq!(matches[0].url, "https://github.com/octo/widgets/blob/main/src/lib.rs");
    }

    #[test]
    fn content_response_distinguishes_file_and_directory() {
        let file: RawContentResponse = serde_json::from_value(json!({
            "name": "README.md", "path": "README.md", "type": "file", "size": 10
        }))
        .unwrap();
        assert!(matches!(file, RawContentResponse::Single(_)));

        let dir: RawContentResponse = serde_json::from_value(json!([
            {"name": "src", "path": "src", "type": "dir", "size": 0},
            {"name": "README.md", "path": "README.md", "type": "file", "size": 10}
        ]))
        .unwrap();
        match dir {
            RawContentResponse::Listing(items) => {
                let items: Vec<ContentItem> = items.into_iter().map(ContentItem::from).collect();
                assert_eq!(items[0].kind, "dir");
                assert!(items[1].is_file());
            }
            other => panic!("expected listing, got {other:?}"),
        }
    }

    // ---- Client creation ----

    #[tokio::test]
    async fn client_is_scoped_to_repo() {
        let octo = GitHubClient::authenticate("ghp_test_token").unwrap();
        let client = GitHubClient::new(octo, &RepoKey::parse("octo/widgets").unwrap());
        assert_eq!(client.owner(), "octo");
        assert_eq!(client.repo(), "widgets");
        assert_eq!(client.route("/issues"), "/repos/octo/widgets/issues");
    }

    #[tokio::test]
    async fn empty_credential_is_unauthorized() {
        let source = GitHubDataSource::new();
        let ctx = SessionContext::new("", RepoKey::parse("octo/widgets").unwrap());
        let err = source.get_repository(&ctx).await.unwrap_err();
        assert!(matches!(err, DataSourceError::Unauthorized(_)));
    }
}

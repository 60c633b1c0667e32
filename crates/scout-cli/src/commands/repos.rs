use scout_core::config::Config;
use scout_core::data_source::RepoDataSource;
use scout_integrations::github::GitHubDataSource;
use scout_intelligence::AgentError;

use super::{friendly_error, github_token};

/// Run the `repos` subcommand. Listing needs no model backend.
pub async fn run(config: &Config, user: Option<&str>) -> anyhow::Result<()> {
    let token = github_token(config)?;
    let repos = GitHubDataSource::new()
        .list_repositories(&token, user)
        .await
        .map_err(|e| friendly_error(AgentError::Source(e)))?;

    if repos.is_empty() {
        println!("No repositories found.");
        return Ok(());
    }
    for repo in &repos {
        let language = repo.language.as_deref().unwrap_or("-");
        let visibility = if repo.private { "private" } else { "public" };
        println!(
            "{:<40} {:<12} {:>6}★ {:<8} {}",
            repo.full_name,
            language,
            repo.stargazers_count,
            visibility,
            repo.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

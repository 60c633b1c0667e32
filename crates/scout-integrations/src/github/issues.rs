use scout_core::data_source::{IssueRecord, IssueStateFilter};

use super::client::{GitHubClient, Result};

const PER_PAGE: u8 = 100;

/// List issues for the client's repository, newest first.
///
/// GitHub's issues endpoint also returns pull requests; they are kept, as the
/// web UI's issue counts include them too.
pub async fn list_issues(
    client: &GitHubClient,
    state: IssueStateFilter,
    max_pages: u32,
) -> Result<Vec<IssueRecord>> {
    let param = match state {
        IssueStateFilter::Open => octocrab::params::State::Open,
        IssueStateFilter::Closed => octocrab::params::State::Closed,
        IssueStateFilter::All => octocrab::params::State::All,
    };

    let mut out = Vec::new();
    for page in 1..=max_pages.max(1) {
        let batch = client
            .octocrab
            .issues(&client.owner, &client.repo)
            .list()
            .state(param)
            .per_page(PER_PAGE)
            .page(page)
            .send()
            .await?;
        let done = batch.items.len() < PER_PAGE as usize;
        out.extend(batch.items.into_iter().map(octocrab_issue_to_record));
        if done {
            break;
        }
    }
    Ok(out)
}

// ---- internal helpers -------------------------------------------------------

fn octocrab_issue_to_record(issue: octocrab::models::issues::Issue) -> IssueRecord {
    let state = match issue.state {
        octocrab::models::IssueState::Closed => "closed",
        _ => "open",
    };

    IssueRecord {
        number: issue.number,
        title: issue.title,
        state: state.to_string(),
        html_url: issue.html_url.to_string(),
        created_at: issue.created_at,
        updated_at: issue.updated_at,
        user: issue.user.login,
        labels: issue.labels.into_iter().map(|l| l.name).collect(),
        comments: issue.comments as u64,
    }
}

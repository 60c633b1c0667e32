use scout_core::config::Config;
use scout_intelligence::render::render_answer;

use super::{build_assistant, friendly_error, github_token, pricing, print_usage};

/// Run the `ask` subcommand: one question, persisted into the repo's history.
pub async fn run(config: &Config, repo: &str, question: &str) -> anyhow::Result<()> {
    let token = github_token(config)?;
    let assistant = build_assistant(config)?;
    let mut session = assistant
        .open_session(&token, repo)
        .await
        .map_err(friendly_error)?;

    let answer = session.ask(question).await.map_err(friendly_error)?;

    println!("{}", render_answer(&answer.result));
    for call in &answer.invocations {
        tracing::debug!(tool = %call.tool_name, elapsed_ms = call.elapsed_ms, "tool used");
    }
    print_usage(session.usage(), &pricing(config));
    Ok(())
}

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use scout_core::config::Config;
use scout_intelligence::render::render_answer;

use super::{build_assistant, friendly_error, github_token, pricing, print_usage};

/// Run the `chat` subcommand: read questions from stdin until EOF or `/quit`.
///
/// `/clear` forgets the conversation. A failed question is reported and the
/// conversation continues with its history intact.
pub async fn run(config: &Config, repo: &str) -> anyhow::Result<()> {
    let token = github_token(config)?;
    let assistant = build_assistant(config)?;
    let mut session = assistant
        .open_session(&token, repo)
        .await
        .map_err(friendly_error)?;

    println!(
        "Chatting about {} ({} earlier messages). /clear to reset, /quit to leave.",
        session.repo(),
        session.history().len()
    );

    let mut stdin = BufReader::new(tokio::io::stdin());
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = next_command(&mut stdin).await? else { break };
        let input = line.as_str();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                match session.clear() {
                    Ok(_) => println!("History cleared."),
                    Err(e) => eprintln!("History cleared in memory, but the file could not be removed: {e}"),
                }
                continue;
            }
            _ => {}
        }

        match session.ask(input).await {
            Ok(answer) => println!("\n{}\n", render_answer(&answer.result)),
            Err(e) => eprintln!("error: {}", friendly_error(e)),
        }
    }

    print_usage(session.usage(), &pricing(config));
    Ok(())
}

/// Next trimmed input line, or `None` at end of input.
async fn next_command<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// repo-scout CLI -- ask questions about a GitHub repository.
#[derive(Parser)]
#[command(name = "scout", version, about)]
struct Cli {
    /// Config file (default: ~/.repo-scout/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question; the answer is added to the repository's history.
    Ask {
        /// Repository as owner/name.
        repo: String,
        /// The question.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Interactive conversation about a repository.
    Chat {
        /// Repository as owner/name.
        repo: String,
    },

    /// List repositories of a user (default: the authenticated user).
    Repos {
        #[arg(long)]
        user: Option<String>,
    },

    /// Inspect or clear stored conversation history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Show the stored conversation for a repository.
    Show { repo: String },
    /// Delete the stored conversation for a repository.
    Clear { repo: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;
    commands::init_logging(&config);

    match cli.command {
        Commands::Ask { repo, question } => {
            commands::ask::run(&config, &repo, &question.join(" ")).await?;
        }
        Commands::Chat { repo } => {
            commands::chat::run(&config, &repo).await?;
        }
        Commands::Repos { user } => {
            commands::repos::run(&config, user.as_deref()).await?;
        }
        Commands::History { action } => match action {
            HistoryAction::Show { repo } => commands::history::show(&config, &repo)?,
            HistoryAction::Clear { repo } => commands::history::clear(&config, &repo)?,
        },
    }

    Ok(())
}

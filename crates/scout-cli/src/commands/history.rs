use anyhow::Context;

use scout_core::config::Config;
use scout_core::history::HistoryStore;
use scout_core::{HistoryMessage, RepoKey};

use super::history_store;

/// Run `history show`: print a one-line summary per stored message.
pub fn show(config: &Config, repo: &str) -> anyhow::Result<()> {
    let repo = RepoKey::parse(repo)?;
    let store = history_store(config);
    for line in summarize(&store, &repo)? {
        println!("{line}");
    }
    Ok(())
}

/// Run `history clear`.
pub fn clear(config: &Config, repo: &str) -> anyhow::Result<()> {
    let repo = RepoKey::parse(repo)?;
    let store = history_store(config);
    let removed = store
        .delete(&repo)
        .with_context(|| format!("failed to remove history for {repo}"))?;
    if removed {
        println!("Cleared history for {repo}.");
    } else {
        println!("No stored history for {repo}.");
    }
    Ok(())
}

fn summarize(store: &HistoryStore, repo: &RepoKey) -> anyhow::Result<Vec<String>> {
    let messages = store
        .read(repo)
        .with_context(|| format!("history file {} is unreadable", store.path_for(repo).display()))?;
    let mut lines = vec![format!("{repo}: {} messages", messages.len())];
    lines.extend(messages.iter().map(describe));
    Ok(lines)
}

fn describe(message: &HistoryMessage) -> String {
    let at = message.timestamp().format("%Y-%m-%d %H:%M:%S");
    let body = match message {
        HistoryMessage::User { content, .. } => preview(content),
        HistoryMessage::Assistant { content, result, .. } => match result {
            Some(r) => format!("{} (confidence {:.2})", preview(content), r.confidence),
            None => preview(content),
        },
        HistoryMessage::ToolCall {
            tool_name,
            arguments,
            ..
        } => format!("{tool_name}({arguments})"),
        HistoryMessage::ToolResult { tool_name, .. } => format!("{tool_name} returned"),
    };
    format!("  [{at}] {:<11} {body}", message.role())
}

fn preview(text: &str) -> String {
    const MAX: usize = 80;
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > MAX {
        format!("{}…", line.chars().take(MAX).collect::<String>())
    } else {
        line.to_string()
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use scout_core::data_source::{CommitRecord, IssueRecord, IssueStateFilter, RepoContent};

use crate::provider::Tool;
use crate::registry::{
    ParamKind, ParamSpec, ReturnShape, ToolArgs, ToolContext, ToolDescriptor, ToolError,
    ToolHandler, ToolRegistry,
};

// ---------------------------------------------------------------------------
// Repository tools
//
// Eight read-only tools over the repository-data collaborator. Handlers only
// add argument resolution, post-fetch filtering for the two analyze tools,
// summary strings, and shape checks on content lookups.
// ---------------------------------------------------------------------------

/// Name of the reserved output tool the model calls with its final answer.
pub const FINAL_RESULT_TOOL: &str = "final_result";

const ISSUE_STATES: &[&str] = &["open", "closed", "all"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoTool {
    GetRepoDetails,
    SearchCode,
    ListIssues,
    AnalyzeIssues,
    ListCommits,
    AnalyzeCommits,
    GetFileContent,
    ListDirectoryContents,
}

impl RepoTool {
    pub const ALL: [RepoTool; 8] = [
        RepoTool::GetRepoDetails,
        RepoTool::SearchCode,
        RepoTool::ListIssues,
        RepoTool::AnalyzeIssues,
        RepoTool::ListCommits,
        RepoTool::AnalyzeCommits,
        RepoTool::GetFileContent,
        RepoTool::ListDirectoryContents,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RepoTool::GetRepoDetails => "get_repo_details",
            RepoTool::SearchCode => "search_code",
            RepoTool::ListIssues => "list_issues",
            RepoTool::AnalyzeIssues => "analyze_issues",
            RepoTool::ListCommits => "list_commits",
            RepoTool::AnalyzeCommits => "analyze_commits",
            RepoTool::GetFileContent => "get_file_content",
            RepoTool::ListDirectoryContents => "list_directory_contents",
        }
    }

    pub fn descriptor(self) -> ToolDescriptor {
        let (description, params, returns) = match self {
            RepoTool::GetRepoDetails => (
                "Get detailed information about the repository: description, primary \
                 language, stars, forks and timestamps.",
                vec![],
                ReturnShape::Object,
            ),
            RepoTool::SearchCode => (
                "Search the repository's code for a term or pattern.",
                vec![query_param("Search term to find in the repository code")],
                ReturnShape::Object,
            ),
            RepoTool::ListIssues => (
                "List issues in the repository, optionally filtered by state.",
                vec![state_param()],
                ReturnShape::Array,
            ),
            RepoTool::AnalyzeIssues => (
                "Find issues whose title or labels match a query, optionally filtered by state.",
                vec![query_param("Query to analyze issues for"), state_param()],
                ReturnShape::Object,
            ),
            RepoTool::ListCommits => (
                "List commits in the repository, optionally limited to a file or directory path.",
                vec![path_param()],
                ReturnShape::Array,
            ),
            RepoTool::AnalyzeCommits => (
                "Find commits whose message matches a query, optionally limited to a path.",
                vec![query_param("Query to analyze commits for"), path_param()],
                ReturnShape::Object,
            ),
            RepoTool::GetFileContent => (
                "Get the full content of a file at the given path.",
                vec![ParamSpec::required(
                    "path",
                    ParamKind::String,
                    "Path to the file within the repository",
                )],
                ReturnShape::Object,
            ),
            RepoTool::ListDirectoryContents => (
                "List the files and subdirectories at a directory path (empty for the root).",
                vec![ParamSpec::optional(
                    "path",
                    ParamKind::String,
                    Some(json!("")),
                    "Path to the directory within the repository",
                )],
                ReturnShape::Array,
            ),
        };
        ToolDescriptor {
            name: self.name(),
            description,
            params,
            returns,
            handler: Arc::new(RepoToolHandler(self)),
        }
    }
}

fn query_param(description: &'static str) -> ParamSpec {
    ParamSpec::required("query", ParamKind::String, description)
}

fn state_param() -> ParamSpec {
    ParamSpec::optional(
        "state",
        ParamKind::OneOf(ISSUE_STATES),
        Some(json!("all")),
        "Filter issues by state (open, closed, all)",
    )
}

fn path_param() -> ParamSpec {
    ParamSpec::optional(
        "path",
        ParamKind::String,
        None,
        "Optional path to filter commits by file or directory",
    )
}

/// The registry of all repository tools. Built once per process.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in RepoTool::ALL {
        registry.register(tool.descriptor());
    }
    registry
}

/// Definition of the reserved output tool; its arguments are the final answer.
pub fn final_result_tool() -> Tool {
    Tool {
        name: FINAL_RESULT_TOOL.to_string(),
        description: "Return the final answer to the user's question. Call this exactly once \
                      when you are done."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "Clear and concise answer to the user's question"
                },
                "sources": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Sources or references supporting the answer"
                },
                "confidence": {
                    "type": "number",
                    "minimum": 0.0,
                    "maximum": 1.0,
                    "description": "Confidence level in the answer provided"
                }
            },
            "required": ["answer", "confidence"]
        }),
    }
}

// ---------------------------------------------------------------------------
// Filters and summaries
// ---------------------------------------------------------------------------

/// Issues whose title or any label contains `query`, case-insensitively.
pub fn filter_issues(issues: Vec<IssueRecord>, query: &str) -> Vec<IssueRecord> {
    let needle = query.to_lowercase();
    issues
        .into_iter()
        .filter(|issue| {
            issue.title.to_lowercase().contains(&needle)
                || issue
                    .labels
                    .iter()
                    .any(|label| label.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Commits whose message contains `query`, case-insensitively.
pub fn filter_commits(commits: Vec<CommitRecord>, query: &str) -> Vec<CommitRecord> {
    let needle = query.to_lowercase();
    commits
        .into_iter()
        .filter(|commit| commit.message.to_lowercase().contains(&needle))
        .collect()
}

fn code_summary(count: usize, query: &str) -> String {
    if count == 0 {
        format!("No code matches found for '{query}' in the repository.")
    } else {
        format!("Found {count} code matches for '{query}' in the repository.")
    }
}

fn issue_summary(count: usize, query: &str, state: IssueStateFilter) -> String {
    if count == 0 {
        format!("No issues found matching '{query}' with state '{state}'.")
    } else {
        format!("Found {count} issues matching '{query}' with state '{state}'.")
    }
}

fn commit_summary(count: usize, query: &str, path: Option<&str>) -> String {
    let scope = path
        .filter(|p| !p.is_empty())
        .map(|p| format!(" in path '{p}'"))
        .unwrap_or_default();
    if count == 0 {
        format!("No commits found matching '{query}'{scope}")
    } else {
        format!("Found {count} commits matching '{query}'{scope}")
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

struct RepoToolHandler(RepoTool);

#[async_trait]
impl ToolHandler for RepoToolHandler {
    async fn call(&self, ctx: ToolContext<'_>, args: &ToolArgs) -> Result<Value, ToolError> {
        let session = ctx.session;
        let source = ctx.source;
        let output = match self.0 {
            RepoTool::GetRepoDetails => serde_json::to_value(source.get_repository(session).await?)?,
            RepoTool::SearchCode => {
                let query = args.require_str("query")?;
                let matches = source.search_code(session, query).await?;
                let summary = code_summary(matches.len(), query);
                json!({ "matches": matches, "summary": summary })
            }
            RepoTool::ListIssues => {
                let issues = source.list_issues(session, state_arg(args)).await?;
                serde_json::to_value(issues)?
            }
            RepoTool::AnalyzeIssues => {
                let query = args.require_str("query")?;
                let state = state_arg(args);
                let issues = filter_issues(source.list_issues(session, state).await?, query);
                let summary = issue_summary(issues.len(), query, state);
                json!({ "issues": issues, "summary": summary })
            }
            RepoTool::ListCommits => {
                let commits = source.list_commits(session, args.str("path")).await?;
                serde_json::to_value(commits)?
            }
            RepoTool::AnalyzeCommits => {
                let query = args.require_str("query")?;
                let path = args.str("path");
                let commits = filter_commits(source.list_commits(session, path).await?, query);
                let summary = commit_summary(commits.len(), query, path);
                json!({ "commits": commits, "summary": summary })
            }
            RepoTool::GetFileContent => {
                let path = args.require_str("path")?;
                match source.get_content(session, path).await? {
                    RepoContent::Item(item) if item.is_file() => serde_json::to_value(item)?,
                    _ => {
                        return Err(ToolError::Shape(format!(
                            "Path '{path}' does not point to a file"
                        )))
                    }
                }
            }
            RepoTool::ListDirectoryContents => {
                let path = args.str("path").unwrap_or_default();
                match source.get_content(session, path).await? {
                    RepoContent::Listing(items) => serde_json::to_value(items)?,
                    RepoContent::Item(_) => {
                        return Err(ToolError::Shape(format!(
                            "Path '{path}' does not point to a directory"
                        )))
                    }
                }
            }
        };
        info!(tool = self.0.name(), repo = %session.repo(), "tool handler finished");
        Ok(output)
    }
}

fn state_arg(args: &ToolArgs) -> IssueStateFilter {
    args.str("state")
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

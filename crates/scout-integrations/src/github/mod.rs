//! GitHub REST access through `octocrab`.

pub mod client;
pub mod commits;
pub mod contents;
pub mod issues;
pub mod repos;
pub mod search;
pub mod source;

pub use client::{GitHubClient, GitHubError};
pub use source::GitHubDataSource;

//! Shared domain types for repo-scout: repository keys, session context,
//! conversation history, the repository-data collaborator interface,
//! configuration, and durable history persistence.

pub mod config;
pub mod data_source;
pub mod error;
pub mod history;
pub mod types;

pub use error::ErrorKind;
pub use types::{HistoryMessage, RepoKey, SessionContext, StructuredResult};

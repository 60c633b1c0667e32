//! Harness: the model-provider interface and the repository tool surface.
//!
//! - [`provider`]: chat-completion messages, tool definitions and the
//!   [`provider::LlmProvider`] trait implemented by concrete backends
//! - [`registry`]: typed tool descriptors, the argument boundary check and
//!   the fixed [`registry::ToolRegistry`]
//! - [`repo_tools`]: the eight read-only repository tools and the reserved
//!   `final_result` output tool

pub mod provider;
pub mod registry;
pub mod repo_tools;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use registry::{ToolContext, ToolError, ToolRegistry};

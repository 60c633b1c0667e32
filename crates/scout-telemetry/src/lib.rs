//! Logging and span helpers shared by the repo-scout crates.
//!
//! - **Logging**: human-readable or JSON output via `tracing-subscriber`
//! - **Spans**: per-query operation spans and per-tool child spans carrying
//!   correlatable trace/span ids

pub mod logging;
pub mod tracing_setup;

pub use logging::{init_logging, init_logging_json, LogFormat};

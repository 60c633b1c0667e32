use serde::{Deserialize, Serialize};

/// Coarse failure category shared by every layer of the assistant.
///
/// The presentation layer renders errors by kind; retry decisions are left
/// to the caller (nothing in the core retries on its own).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or rejected credential.
    Authentication,
    /// Repository, file or path does not exist, or has the wrong shape.
    NotFound,
    /// Tool arguments or model output failed schema checks.
    Validation,
    /// Network or upstream failure that may succeed if re-issued.
    Transient,
    /// Anything else (runtime misuse, serialization bugs).
    Internal,
}

impl ErrorKind {
    /// Whether re-issuing the same query could plausibly succeed.
    pub fn is_retriable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::NotFound => "not found",
            ErrorKind::Validation => "validation",
            ErrorKind::Transient => "transient",
            ErrorKind::Internal => "internal",
        };
        f.write_str(label)
    }
}

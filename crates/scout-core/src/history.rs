//! Durable per-repository conversation history.
//!
//! Each repository gets one JSON file, `<dir>/<owner>_<name>_history.json`,
//! holding the ordered [`HistoryMessage`] sequence. A missing file is an
//! empty history.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::types::{HistoryMessage, RepoKey};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum HistoryStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Free-standing primitives
// ---------------------------------------------------------------------------

/// Write `messages` to `path`, replacing any previous copy.
///
/// The new content goes to a sibling `.tmp` file first and is renamed over
/// the target, so a failed write never leaves a truncated history behind.
pub fn save_history(messages: &[HistoryMessage], path: &Path) -> Result<(), HistoryStoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(messages)?;
    let tmp = tmp_path(path);
    if let Err(e) = std::fs::write(&tmp, json) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    debug!(path = %path.display(), messages = messages.len(), "history saved");
    Ok(())
}

/// Strict read: `Ok(empty)` when the file is absent, an error when it
/// cannot be read or parsed.
pub fn read_history(path: &Path) -> Result<Vec<HistoryMessage>, HistoryStoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Lenient read used at session start. Never fails: unreadable or corrupt
/// files are logged and treated as an empty history.
pub fn load_history(path: &Path) -> Vec<HistoryMessage> {
    match read_history(path) {
        Ok(messages) => messages,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not load history; starting empty");
            Vec::new()
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// HistoryStore
// ---------------------------------------------------------------------------

/// History files for many repositories under one directory.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    base_dir: PathBuf,
}

impl HistoryStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn path_for(&self, repo: &RepoKey) -> PathBuf {
        self.base_dir
            .join(format!("{}_history.json", repo.file_token()))
    }

    pub fn save(&self, repo: &RepoKey, messages: &[HistoryMessage]) -> Result<(), HistoryStoreError> {
        save_history(messages, &self.path_for(repo))
    }

    pub fn load(&self, repo: &RepoKey) -> Vec<HistoryMessage> {
        load_history(&self.path_for(repo))
    }

    pub fn read(&self, repo: &RepoKey) -> Result<Vec<HistoryMessage>, HistoryStoreError> {
        read_history(&self.path_for(repo))
    }

    /// Remove the durable copy. Returns `true` if a file was removed.
    pub fn delete(&self, repo: &RepoKey) -> Result<bool, HistoryStoreError> {
        let path = self.path_for(repo);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StructuredResult;
    use serde_json::json;

    fn temp_store() -> (HistoryStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = HistoryStore::new(dir.path().join("chat_history"));
        (store, dir)
    }

    fn sample_conversation() -> Vec<HistoryMessage> {
        vec![
            HistoryMessage::user("What are the open bugs?"),
            HistoryMessage::tool_call("call_1", "analyze_issues", json!({"query": "bug", "state": "open"})),
            HistoryMessage::tool_result(
                "call_1",
                "analyze_issues",
                json!({"summary": "Found 1 issues matching 'bug' with state 'open'.", "issues": []}),
            ),
            HistoryMessage::final_answer(StructuredResult {
                answer: "There is one open bug.".into(),
                sources: vec!["https://github.com/o/r/issues/1".into()],
                confidence: 0.9,
            }),
        ]
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (store, _dir) = temp_store();
        let repo = RepoKey::parse("octo/widgets").unwrap();
        let messages = sample_conversation();

        store.save(&repo, &messages).unwrap();
        assert_eq!(store.load(&repo), messages);
        assert_eq!(store.read(&repo).unwrap(), messages);
    }

    #[test]
    fn test_path_layout() {
        let store = HistoryStore::new("chat_history");
        let repo = RepoKey::parse("octo/widgets").unwrap();
        assert_eq!(
            store.path_for(&repo),
            PathBuf::from("chat_history/octo_widgets_history.json")
        );
    }

    #[test]
    fn test_load_nonexistent_is_empty() {
        let (store, _dir) = temp_store();
        let repo = RepoKey::parse("nobody/nothing").unwrap();
        assert!(store.load(&repo).is_empty());
        assert!(store.read(&repo).unwrap().is_empty());
        assert!(load_history(Path::new("/no/such/dir/history.json")).is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty_but_read_errors() {
        let (store, _dir) = temp_store();
        let repo = RepoKey::parse("octo/broken").unwrap();
        let path = store.path_for(&repo);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert!(store.load(&repo).is_empty());
        assert!(matches!(store.read(&repo), Err(HistoryStoreError::Serde(_))));
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_tmp() {
        let (store, _dir) = temp_store();
        let repo = RepoKey::parse("octo/widgets").unwrap();
        store.save(&repo, &sample_conversation()).unwrap();

        let shorter = vec![HistoryMessage::user("hi")];
        store.save(&repo, &shorter).unwrap();
        assert_eq!(store.load(&repo), shorter);

        let leftovers: Vec<_> = std::fs::read_dir(store.base_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_histories_are_independent_per_repo() {
        let (store, _dir) = temp_store();
        let a = RepoKey::parse("a/b_c").unwrap();
        let b = RepoKey::parse("a-b/c").unwrap();
        store.save(&a, &[HistoryMessage::user("for a")]).unwrap();
        store.save(&b, &[HistoryMessage::user("for b")]).unwrap();

        assert_ne!(store.path_for(&a), store.path_for(&b));
        assert_eq!(store.load(&a).len(), 1);
        assert_eq!(store.load(&b).len(), 1);
        assert_ne!(store.load(&a), store.load(&b));
    }

    #[test]
    fn test_delete() {
        let (store, _dir) = temp_store();
        let repo = RepoKey::parse("octo/widgets").unwrap();
        store.save(&repo, &sample_conversation()).unwrap();

        assert!(store.delete(&repo).unwrap());
        assert!(!store.delete(&repo).unwrap());
        assert!(store.load(&repo).is_empty());
    }

    #[test]
    fn test_roundtrip_preserves_full_float_precision() {
        let (store, _dir) = temp_store();
        let repo = RepoKey::parse("octo/floats").unwrap();
        let messages = vec![
            HistoryMessage::tool_result(
                "call_1",
                "search_code",
                json!({"matches": [
                    {"path": "src/a.rs", "score": 0.21291890726713458},
                    {"path": "src/b.rs", "score": 0.9259338926496359},
                    {"path": "src/c.rs", "score": 0.44166130716816643},
                ]}),
            ),
            HistoryMessage::final_answer(StructuredResult {
                answer: "Scored matches.".into(),
                sources: vec![],
                confidence: 0.9856906946328695,
            }),
        ];

        store.save(&repo, &messages).unwrap();
        let loaded = store.read(&repo).unwrap();
        assert_eq!(loaded, messages);
        match &loaded[1] {
            HistoryMessage::Assistant { result: Some(r), .. } => {
                assert_eq!(r.confidence.to_bits(), 0.9856906946328695_f64.to_bits());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_free_functions_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("h.json");
        let messages = sample_conversation();
        save_history(&messages, &path).unwrap();
        assert_eq!(load_history(&path), messages);
    }
}

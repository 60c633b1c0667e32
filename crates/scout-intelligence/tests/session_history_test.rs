//! Sessions over the on-disk history store.

use std::sync::Arc;

use serde_json::json;

use scout_core::history::{load_history, save_history, HistoryStore};
use scout_core::{HistoryMessage, RepoKey, StructuredResult};
use scout_harness::provider::{Response, ToolCall};
use scout_harness::testing::{commit, FixtureSource};
use scout_intelligence::{MockProvider, RepoAssistant};

fn final_answer(answer: &str, confidence: f64) -> serde_json::Value {
    json!({"answer": answer, "sources": ["README.md"], "confidence": confidence})
}

#[tokio::test]
async fn session_persists_and_reloads_history() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new()
        .with_response(Response::calls(vec![ToolCall {
            id: "call_1".into(),
            name: "analyze_commits".into(),
            arguments: json!({"query": "fix"}).to_string(),
        }]))
        .with_final_result(final_answer("One fix commit.", 0.8))
        .with_final_result(final_answer("Still one.", 0.75));
    let source = FixtureSource::new("octo/widgets").with_commits(vec![
        commit("aaa111", "Fix null pointer"),
        commit("bbb222", "Add docs"),
    ]);
    let assistant = RepoAssistant::new(
        Arc::new(provider),
        Arc::new(source),
        HistoryStore::new(dir.path()),
    );

    {
        let mut session = assistant.open_session("tok", "octo/widgets").await.unwrap();
        assert!(session.history().is_empty());
        let answer = session.ask("Any fixes?").await.unwrap();
        assert_eq!(answer.result.answer, "One fix commit.");
        assert_eq!(answer.invocations.len(), 1);
        assert_eq!(session.history().len(), 4);
    }

    let repo = RepoKey::parse("octo/widgets").unwrap();
    let path = assistant.store().path_for(&repo);
    assert!(path.ends_with("octo_widgets_history.json"));
    let on_disk = load_history(&path);
    let roles: Vec<_> = on_disk.iter().map(HistoryMessage::role).collect();
    assert_eq!(roles, ["user", "tool-call", "tool-result", "assistant"]);
    match &on_disk[2] {
        HistoryMessage::ToolResult { content, .. } => {
            assert_eq!(content["commits"].as_array().unwrap().len(), 1);
        }
        other => panic!("expected tool result, got {other:?}"),
    }

    let mut session = assistant.open_session("tok", "octo/widgets").await.unwrap();
    assert_eq!(session.history().len(), 4);
    session.ask("And now?").await.unwrap();
    assert_eq!(session.history().len(), 6);
    assert_eq!(session.usage().requests, 1);
}

#[tokio::test]
async fn clear_removes_memory_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = RepoAssistant::new(
        Arc::new(MockProvider::new().with_final_result(final_answer("ok", 0.5))),
        Arc::new(FixtureSource::new("octo/widgets")),
        HistoryStore::new(dir.path()),
    );
    let mut session = assistant.open_session("tok", "octo/widgets").await.unwrap();
    session.ask("hello").await.unwrap();

    let path = assistant.store().path_for(session.repo());
    assert!(path.exists());
    assert!(session.clear().unwrap());
    assert!(session.history().is_empty());
    assert!(!path.exists());
    assert!(!session.clear().unwrap());
}

#[tokio::test]
async fn histories_are_independent_per_repository() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(dir.path());
    let a = RepoKey::parse("octo/widgets").unwrap();
    let b = RepoKey::parse("octo-widgets/x").unwrap();
    store.save(&a, &[HistoryMessage::user("about a")]).unwrap();
    store.save(&b, &[HistoryMessage::user("about b")]).unwrap();
    assert_ne!(store.path_for(&a), store.path_for(&b));
    assert_eq!(store.load(&a).len(), 1);
    assert_eq!(store.load(&b).len(), 1);
}

#[test]
fn primitives_round_trip_a_full_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("conversation.json");
    let messages = vec![
        HistoryMessage::user("Which language?"),
        HistoryMessage::tool_call("c1", "get_repo_details", json!({})),
        HistoryMessage::tool_result("c1", "get_repo_details", json!({"language": "Rust"})),
        HistoryMessage::final_answer(StructuredResult {
            answer: "Rust.".into(),
            sources: vec!["https://github.com/octo/widgets".into()],
            confidence: 0.95,
        }),
    ];
    save_history(&messages, &path).unwrap();
    assert_eq!(load_history(&path), messages);
    assert!(load_history(&dir.path().join("missing.json")).is_empty());
}

#[test]
fn blocking_session_outside_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = RepoAssistant::new(
        Arc::new(MockProvider::new().with_final_result(final_answer("sync ok", 0.9))),
        Arc::new(FixtureSource::new("octo/widgets")),
        HistoryStore::new(dir.path()),
    );
    let mut session = assistant.open_session_blocking("tok", "octo/widgets").unwrap();
    let answer = session.ask_blocking("hi").unwrap();
    assert_eq!(answer.result.answer, "sync ok");
    assert_eq!(session.history().len(), 2);
}

//! End-to-end `SessionStore` behavior: a session built up across several
//! independent `SessionStore` handles (as if across process restarts)
//! round-trips through replay validation.

use vibecore_core::{validate_replay, AssistantStatus, Item, SessionStore};

fn assistant(text: &str) -> Item {
    Item::AssistantMessage { content: vec![text.to_string()], status: AssistantStatus::Completed }
}

#[tokio::test]
async fn a_full_turn_replays_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");

    let writer = SessionStore::at_path(path.clone());
    writer.add_items(&[Item::UserText { content: "list the files here".to_string() }]).await.unwrap();
    writer
        .add_items(&[Item::ToolCall { call_id: "call_1".to_string(), tool_name: "ls".to_string(), arguments: "{}".to_string() }])
        .await
        .unwrap();
    writer.add_items(&[Item::ToolOutput { call_id: "call_1".to_string(), output: "a.rs\nb.rs".to_string() }]).await.unwrap();
    writer.add_items(&[assistant("There are two files: a.rs and b.rs.")]).await.unwrap();

    // A fresh handle to the same path, as a restarted process would open.
    let reader = SessionStore::at_path(path);
    let items = reader.get_items(None).await.unwrap();
    assert_eq!(items.len(), 4);
    assert!(validate_replay(&items).is_ok());
}

#[tokio::test]
async fn an_interrupted_turn_fails_replay_validation() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::at_path(dir.path().join("session.jsonl"));

    store.add_items(&[Item::UserText { content: "run the tests".to_string() }]).await.unwrap();
    store
        .add_items(&[Item::ToolCall {
            call_id: "call_1".to_string(),
            tool_name: "execute_command".to_string(),
            arguments: r#"{"command":"cargo test"}"#.to_string(),
        }])
        .await
        .unwrap();
    // Process crashes before the matching ToolOutput is appended.

    let items = store.get_items(None).await.unwrap();
    let err = validate_replay(&items).unwrap_err();
    assert!(format!("{err}").contains("call_1"));
}

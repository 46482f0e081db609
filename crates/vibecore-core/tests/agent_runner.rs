//! Drives `AgentRunner` against a scripted `ModelAdapter` standing in for
//! the network, matching the teacher's `tests/mocks.rs` pattern of a fake
//! provider instead of a live API call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::unbounded_channel;
use tokio_util::sync::CancellationToken;

use vibecore_core::{build_registry, Agent, AllowedDirectory, Event, Item, PathValidator, SessionStore, SubAgentSupervisor};
use vibecore_llm::streaming::{ChunkStream, PlaybackChunkStream, SseDecoder};
use vibecore_llm::{ModelAdapter, ModelError, ModelRequest};

/// Replies with a tool call on the first turn, then a plain text message
/// once it sees the tool's output in the replayed history.
struct ScriptedAdapter {
    calls: AtomicUsize,
}

#[async_trait]
impl ModelAdapter for ScriptedAdapter {
    async fn send(&self, request: ModelRequest, _cancel: CancellationToken) -> Result<SseDecoder<Box<dyn ChunkStream>>, ModelError> {
        let call_number = self.calls.fetch_add(1, Ordering::SeqCst);
        let saw_tool_output = request.messages.iter().any(|m| {
            m.content.iter().any(|block| matches!(block, vibecore_llm::ModelContentBlock::ToolResult { .. }))
        });

        let payloads = if call_number == 0 && !saw_tool_output {
            vec![
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"call_1","name":"read_file","input":{}}}"#.to_string(),
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"file_path\":\"README.md\"}"}}"#.to_string(),
                r#"{"type":"content_block_stop","index":0}"#.to_string(),
                r#"{"type":"message_stop"}"#.to_string(),
            ]
        } else {
            vec![
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#.to_string(),
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"The README describes the project."}}"#.to_string(),
                r#"{"type":"content_block_stop","index":0}"#.to_string(),
                r#"{"type":"message_stop"}"#.to_string(),
            ]
        };

        let stream: Box<dyn ChunkStream> = Box::new(PlaybackChunkStream::new(payloads));
        Ok(SseDecoder::new(stream))
    }
}

#[tokio::test]
async fn a_tool_call_round_trip_ends_in_turn_finished() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.md"), "hello world").unwrap();

    let adapter: Arc<dyn ModelAdapter> = Arc::new(ScriptedAdapter { calls: AtomicUsize::new(0) });
    let tools = Arc::new(build_registry());
    let path_validator = Arc::new(PathValidator::new(vec![AllowedDirectory::resolve(dir.path()).unwrap()]));
    let supervisor = Arc::new(SubAgentSupervisor::new());
    let session = SessionStore::at_path(dir.path().join("session.jsonl"));

    let (tx, mut rx) = unbounded_channel();
    let runner = vibecore_core::AgentRunner::new(adapter, tools, session.clone(), path_validator, supervisor, tx);

    let agent = Agent::new("main", "be helpful", "claude-opus-4");
    runner.run_turn(agent, "what does the README say?".to_string()).await.unwrap();

    let mut saw_tool_call = false;
    let mut saw_tool_output = false;
    let mut final_output = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            Event::ToolCallStarted { tool_name, .. } if tool_name == "read_file" => saw_tool_call = true,
            Event::ToolCallCompleted { output, .. } => {
                assert!(output.contains("hello world"));
                saw_tool_output = true;
            }
            Event::TurnFinished { final_output: out } => final_output = Some(out),
            _ => {}
        }
    }

    assert!(saw_tool_call, "expected a read_file tool call to be emitted");
    assert!(saw_tool_output, "expected the tool's output to be emitted");
    assert_eq!(final_output.as_deref(), Some("The README describes the project."));

    let items = session.get_items(None).await.unwrap();
    let has_call_then_output = items.windows(2).any(|pair| {
        matches!(&pair[0], Item::ToolCall { call_id, .. } if call_id == "call_1")
            && matches!(&pair[1], Item::ToolOutput { call_id, .. } if call_id == "call_1")
    });
    assert!(has_call_then_output, "ToolCall must be immediately followed by its ToolOutput in the session log");
}

//! Agent loop tests against a scripted backend and in-process tools.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use parley_harness::{Agent, AgentEvent, HarnessError, ParleyConfig};
use parley_llm::{
    AvailableTool, Backend, ChunkStream, CompletionOptions, LlmChunk, LlmError, LlmMessage,
    LlmResult, ModelConfig, Role, ToolCall,
};
use parley_mcp::McpError;
use parley_tools::{Tool, ToolError, ToolManager, ToolResult};

/// Replies with queued messages and records every conversation it was sent.
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<VecDeque<LlmResult<LlmMessage>>>,
    requests: Mutex<Vec<Vec<LlmMessage>>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<LlmResult<LlmMessage>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
        })
    }

    fn next_reply(&self, messages: &[LlmMessage]) -> LlmResult<LlmMessage> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(LlmMessage::assistant("out of script")))
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

fn chunk(message: LlmMessage) -> LlmChunk {
    LlmChunk {
        message,
        finish_reason: None,
        usage: None,
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn complete(
        &self,
        _model: &ModelConfig,
        messages: &[LlmMessage],
        _tools: Option<&[AvailableTool]>,
        _options: &CompletionOptions,
    ) -> LlmResult<LlmChunk> {
        self.next_reply(messages).map(chunk)
    }

    /// Streams the content in two halves and each tool call as two deltas.
    async fn complete_streaming(
        &self,
        _model: &ModelConfig,
        messages: &[LlmMessage],
        _tools: Option<&[AvailableTool]>,
        _options: &CompletionOptions,
    ) -> LlmResult<ChunkStream> {
        let reply = self.next_reply(messages)?;
        let text = reply.text().to_string();
        let (head, tail) = text.split_at(text.len() / 2);

        let mut chunks = vec![
            Ok(chunk(LlmMessage::assistant(head))),
            Ok(chunk(LlmMessage::assistant(tail))),
        ];
        for (index, call) in reply.tool_calls.unwrap_or_default().into_iter().enumerate() {
            let args = call.function.arguments.clone().unwrap_or_default();
            let (first, rest) = args.split_at(args.len() / 2);

            let mut opening = call.clone();
            opening.index = Some(index);
            opening.function.arguments = Some(first.to_string());
            let mut closing = ToolCall::new("", "", rest);
            closing.index = Some(index);

            for delta in [opening, closing] {
                chunks.push(Ok(chunk(LlmMessage::assistant_with_tool_calls(
                    None,
                    vec![delta],
                ))));
            }
        }
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

struct Add;

#[async_trait]
impl Tool for Add {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add two numbers"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"a": {"type": "number"}, "b": {"type": "number"}}})
    }

    async fn execute(&self, args: Value) -> ToolResult<Value> {
        let a = args["a"].as_f64().ok_or_else(|| ToolError::InvalidArguments("a".into()))?;
        let b = args["b"].as_f64().ok_or_else(|| ToolError::InvalidArguments("b".into()))?;
        Ok(json!({"result": (a + b).to_string()}))
    }
}

/// Fails the way a tool does when the MCP session underneath has gone away.
struct Disconnected;

#[async_trait]
impl Tool for Disconnected {
    fn name(&self) -> &str {
        "lookup"
    }

    fn description(&self) -> &str {
        "Always loses the connection"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, _args: Value) -> ToolResult<Value> {
        Err(McpError::ConnectionFailed("server exited".into()).into())
    }
}

fn tools() -> ToolManager {
    let mut manager = ToolManager::new();
    manager.register(Arc::new(Add));
    manager.register(Arc::new(Disconnected));
    manager
}

fn config(stream: bool) -> ParleyConfig {
    ParleyConfig {
        stream,
        system_prompt: Some("be brief".into()),
        ..ParleyConfig::default()
    }
}

fn add_call(id: &str) -> LlmMessage {
    LlmMessage::assistant_with_tool_calls(
        Some("Let me add those.".into()),
        vec![ToolCall::new(id, "add", r#"{"a": 2, "b": 3}"#)],
    )
}

async fn run(agent: &mut Agent, query: &str) -> (Result<(), HarnessError>, Vec<AgentEvent>) {
    let (tx, mut rx) = mpsc::channel(64);
    let result = agent.act(query, tx).await;
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

fn assistant_texts(events: &[AgentEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::Assistant(a) => Some(a.content.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn plain_answer_is_one_assistant_event() {
    for stream in [false, true] {
        let backend = ScriptedBackend::new(vec![Ok(LlmMessage::assistant("Hello there"))]);
        let mut agent = Agent::from_backend(&config(stream), tools(), backend.clone()).unwrap();

        let (result, events) = run(&mut agent, "hi").await;

        assert!(result.is_ok());
        assert_eq!(assistant_texts(&events), vec!["Hello there".to_string()]);
        assert_eq!(backend.request_count(), 1);
        let roles: Vec<Role> = agent.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }
}

#[tokio::test]
async fn tool_round_trip_emits_events_in_order() {
    for stream in [false, true] {
        let backend = ScriptedBackend::new(vec![
            Ok(add_call("call_1")),
            Ok(LlmMessage::assistant("The sum is 5.")),
        ]);
        let mut agent = Agent::from_backend(&config(stream), tools(), backend.clone()).unwrap();

        let (result, events) = run(&mut agent, "what is 2 + 3?").await;
        assert!(result.is_ok());

        assert_eq!(events.len(), 4, "stream={stream}: {events:?}");
        assert!(matches!(&events[0], AgentEvent::Assistant(a) if a.content == "Let me add those."));
        match &events[1] {
            AgentEvent::ToolCall(call) => {
                assert_eq!(call.tool_name, "add");
                assert_eq!(call.args, json!({"a": 2, "b": 3}));
                assert_eq!(call.tool_call_id, "call_1");
            }
            other => panic!("expected tool call, got {other:?}"),
        }
        match &events[2] {
            AgentEvent::ToolResult(result) => {
                assert_eq!(result.result, Some(json!({"result": "5"})));
                assert!(result.error.is_none());
                assert!(result.duration.is_some());
            }
            other => panic!("expected tool result, got {other:?}"),
        }
        assert!(matches!(&events[3], AgentEvent::Assistant(a) if a.content == "The sum is 5."));

        let second_request = &backend.requests.lock().unwrap()[1];
        let tool_reply = second_request.last().unwrap();
        assert_eq!(tool_reply.role, Role::Tool);
        assert_eq!(tool_reply.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_reply.text(), "result: 5");
    }
}

#[tokio::test]
async fn tool_failures_are_reported_to_the_model() {
    let backend = ScriptedBackend::new(vec![
        Ok(LlmMessage::assistant_with_tool_calls(
            None,
            vec![ToolCall::new("call_1", "subtract", "{}")],
        )),
        Ok(LlmMessage::assistant("I can't subtract.")),
    ]);
    let mut agent = Agent::from_backend(&config(false), tools(), backend.clone()).unwrap();

    let (result, events) = run(&mut agent, "5 - 3?").await;

    assert!(result.is_ok());
    let error = events.iter().find_map(|e| match e {
        AgentEvent::ToolResult(r) => r.error.clone(),
        _ => None,
    });
    assert!(error.unwrap().contains("subtract"));

    let tool_reply = backend.requests.lock().unwrap()[1].last().cloned().unwrap();
    assert!(tool_reply.text().starts_with("<tool_error>subtract failed:"));
}

#[tokio::test]
async fn broken_session_aborts_the_query() {
    let backend = ScriptedBackend::new(vec![Ok(LlmMessage::assistant_with_tool_calls(
        None,
        vec![ToolCall::new("call_1", "lookup", "{}")],
    ))]);
    let mut agent = Agent::from_backend(&config(false), tools(), backend.clone()).unwrap();

    let (result, events) = run(&mut agent, "find customer 7").await;

    let err = result.unwrap_err();
    assert!(err.is_fatal());
    assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolCall(_))));
    assert!(!events.iter().any(|e| matches!(e, AgentEvent::ToolResult(_))));
    assert_eq!(backend.request_count(), 1);
}

#[tokio::test]
async fn model_failure_rolls_back_the_conversation() {
    let backend = ScriptedBackend::new(vec![
        Ok(LlmMessage::assistant("first answer")),
        Err(LlmError::ApiError {
            provider: "openai".into(),
            status: 503,
            message: "overloaded".into(),
        }),
        Ok(LlmMessage::assistant("second answer")),
    ]);
    let mut agent = Agent::from_backend(&config(false), tools(), backend.clone()).unwrap();

    run(&mut agent, "one").await.0.unwrap();
    let before = agent.messages().to_vec();

    let (result, events) = run(&mut agent, "two").await;
    let err = result.unwrap_err();
    assert!(!err.is_fatal());
    assert!(events.is_empty());
    assert_eq!(agent.messages(), before.as_slice());

    run(&mut agent, "three").await.0.unwrap();
    let last_request = backend.requests.lock().unwrap().last().cloned().unwrap();
    let users: Vec<&str> = last_request
        .iter()
        .filter(|m| m.role == Role::User)
        .map(LlmMessage::text)
        .collect();
    assert_eq!(users, vec!["one", "three"]);
}

#[tokio::test]
async fn turn_limit_stops_a_looping_model() {
    let backend = ScriptedBackend::new(vec![Ok(add_call("a")), Ok(add_call("b")), Ok(add_call("c"))]);
    let config = ParleyConfig {
        max_turns: 2,
        ..config(false)
    };
    let mut agent = Agent::from_backend(&config, tools(), backend.clone()).unwrap();

    let (result, events) = run(&mut agent, "loop").await;

    assert!(result.is_ok());
    assert_eq!(backend.request_count(), 2);
    let last = assistant_texts(&events).pop().unwrap();
    assert!(last.contains("2 model turns"));
}

#[tokio::test]
async fn system_prompt_leads_the_conversation() {
    let backend = ScriptedBackend::new(vec![]);
    let agent = Agent::from_backend(&config(true), tools(), backend).unwrap();

    assert_eq!(agent.messages().len(), 1);
    assert_eq!(agent.messages()[0].role, Role::System);
    assert_eq!(agent.messages()[0].text(), "be brief");
    assert_eq!(agent.tool_names(), vec!["add".to_string(), "lookup".to_string()]);
}

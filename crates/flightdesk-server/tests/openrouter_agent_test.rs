//! `OpenRouterAgent` against a local chat-completions server that replays
//! canned replies and records every request body.

#![cfg(feature = "axum-integration")]

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use flightdesk_server::config::OpenRouterConfig;
use flightdesk_server::error::TransportError;
use flightdesk_server::prelude::*;
use flightdesk_server::OpenRouterAgent;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const ARGS: &str = r#"{"origin":"NYC","destination":"SFO","departureDate":"2025-07-20"}"#;

#[derive(Default)]
struct Completions {
    /// Served in order; the last one repeats.
    replies: Mutex<VecDeque<(StatusCode, Value)>>,
    requests: Mutex<Vec<Value>>,
    delay: Duration,
}

impl Completions {
    fn replying(replies: impl IntoIterator<Item = Value>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| (StatusCode::OK, r)).collect()),
            ..Self::default()
        }
    }

    fn requests(&self) -> Vec<Value> {
        self.requests.lock().clone()
    }
}

async fn completions(
    State(mock): State<Arc<Completions>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    mock.requests.lock().push(body);
    tokio::time::sleep(mock.delay).await;
    let reply = {
        let mut replies = mock.replies.lock();
        if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        }
    };
    let (status, body) = reply.unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, json!({})));
    (status, Json(body))
}

async fn serve(mock: Arc<Completions>, timeout: Duration) -> OpenRouterAgent {
    let app = Router::new()
        .route("/api/v1/chat/completions", post(completions))
        .with_state(mock);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });

    OpenRouterAgent::new(
        OpenRouterConfig {
            api_key: "sk-test".into(),
            model: "openai/gpt-4o-mini".into(),
            base_url: format!("http://{addr}/api/v1"),
            timeout,
        },
        reqwest::Client::new(),
        Arc::new(ToolRegistry::offline()),
    )
}

fn tool_call(id: &str, arguments: &str) -> Value {
    json!({"choices": [{"message": {
        "role": "assistant",
        "content": null,
        "tool_calls": [{
            "id": id,
            "type": "function",
            "function": {"name": "search-flights-enhanced", "arguments": arguments}
        }]
    }}]})
}

fn answer(text: &str) -> Value {
    json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
}

fn options(tool_choice: ToolChoice, max_steps: usize) -> GenerateOptions {
    GenerateOptions {
        tool_choice,
        max_steps,
    }
}

#[tokio::test]
async fn tool_results_are_fed_back_until_the_model_answers() {
    let mock = Arc::new(Completions::replying([
        tool_call("call_1", ARGS),
        answer("Six flights found, cheapest first."),
    ]));
    let agent = serve(Arc::clone(&mock), Duration::from_secs(5)).await;

    let generation = agent
        .generate(
            &[ChatMessage::user("flights NYC to SFO")],
            &options(ToolChoice::Required, 5),
            &AgentContext::empty(),
        )
        .await
        .expect("generation succeeds");

    assert_eq!(generation.text, "Six flights found, cheapest first.");
    assert_eq!(generation.tool_calls.len(), 1);
    let call = &generation.tool_calls[0];
    assert_eq!(call.id.as_str(), "call_1");
    assert_eq!(call.kind, ToolKind::EnhancedFlights);
    assert_eq!(call.args["origin"], "NYC");
    assert_eq!(call.output.total_results, 6);

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0]["tool_choice"], "required");
    assert_eq!(requests[1]["tool_choice"], "auto");

    let messages = requests[1]["messages"].as_array().expect("messages");
    let roles: Vec<&str> = messages.iter().filter_map(|m| m["role"].as_str()).collect();
    assert_eq!(roles, ["system", "user", "assistant", "tool"]);
    assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
    assert_eq!(messages[3]["tool_call_id"], "call_1");
    let fed_back: Value =
        serde_json::from_str(messages[3]["content"].as_str().expect("tool content")).expect("json");
    assert_eq!(fed_back["totalResults"], 6);
}

#[tokio::test]
async fn step_limit_returns_the_calls_made_so_far() {
    let mock = Arc::new(Completions::replying([tool_call("call_loop", ARGS)]));
    let agent = serve(Arc::clone(&mock), Duration::from_secs(5)).await;

    let generation = agent
        .generate(
            &[ChatMessage::user("keep searching")],
            &options(ToolChoice::Required, 2),
            &AgentContext::empty(),
        )
        .await
        .expect("generation succeeds");

    assert_eq!(generation.tool_calls.len(), 2);
    assert!(generation.text.is_empty());
    assert_eq!(mock.requests().len(), 2);
}

#[tokio::test]
async fn malformed_arguments_are_a_tool_error() {
    let mock = Arc::new(Completions::replying([tool_call("call_bad", "{\"origin\":")]));
    let agent = serve(mock, Duration::from_secs(5)).await;

    let err = agent
        .generate(
            &[ChatMessage::user("flights")],
            &options(ToolChoice::Required, 3),
            &AgentContext::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::Tool(ToolError::InvalidArguments { tool: "search-flights-enhanced", .. })
    ));
}

#[tokio::test]
async fn slow_model_times_out() {
    let mock = Arc::new(Completions {
        delay: Duration::from_millis(500),
        ..Completions::replying([answer("too late")])
    });
    let agent = serve(mock, Duration::from_millis(50)).await;

    let err = agent
        .generate(
            &[ChatMessage::user("hi")],
            &GenerateOptions::default(),
            &AgentContext::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::Transport(TransportError::Timeout { duration_ms: 50 })
    ));
}

#[tokio::test]
async fn error_status_is_an_upstream_error() {
    let mock = Arc::new(Completions {
        replies: Mutex::new(VecDeque::from([(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"error": "overloaded"}),
        )])),
        ..Completions::default()
    });
    let agent = serve(mock, Duration::from_secs(5)).await;

    let err = agent
        .generate(
            &[ChatMessage::user("hi")],
            &GenerateOptions::default(),
            &AgentContext::empty(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AgentError::Upstream { service: "OpenRouter", ref message } if message.starts_with("status 503")
    ));
}

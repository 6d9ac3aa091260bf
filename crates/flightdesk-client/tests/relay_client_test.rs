//! Integration tests for `RelayClient` against a mock server on a random
//! port. The mock returns canned SSE bodies chosen by the request path.

use flightdesk_client::{collect_run, ClientError, Event, RelayClient, RunIds};
use flightdesk_client::flightdesk_core::flight::SearchParams;
use futures::StreamExt;
use serde_json::json;
use std::net::SocketAddr;
use tokio::sync::oneshot;

mod mock_server {
    use axum::body::Body;
    use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
    use axum::http::StatusCode;
    use axum::response::Response;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn sse(frames: &[Value]) -> Response {
        let body: String = frames.iter().map(|f| format!("data: {f}\n\n")).collect();
        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .body(Body::from(body))
            .expect("response builder should not fail")
    }

    /// Echoes the ids back in a minimal well-formed run.
    async fn flight_search(Json(body): Json<Value>) -> Response {
        let (thread_id, run_id) = (&body["threadId"], &body["runId"]);
        sse(&[
            serde_json::json!({"type": "RUN_STARTED", "threadId": thread_id, "runId": run_id}),
            serde_json::json!({"type": "TEXT_MESSAGE_START", "messageId": "m1", "role": "assistant"}),
            serde_json::json!({"type": "TOOL_CALL_START", "toolCallId": "c1", "toolCallName": "search-flights-enhanced", "parentMessageId": "m1"}),
            serde_json::json!({"type": "TOOL_CALL_ARGS", "toolCallId": "c1", "delta": body["searchParams"].to_string()}),
            serde_json::json!({"type": "TOOL_CALL_END", "toolCallId": "c1"}),
            serde_json::json!({"type": "TEXT_MESSAGE_CONTENT", "messageId": "m1", "delta": "Found flights"}),
            serde_json::json!({"type": "TEXT_MESSAGE_END", "messageId": "m1"}),
            serde_json::json!({"type": "RUN_FINISHED", "threadId": thread_id, "runId": run_id, "result": {"success": true, "toolCallCount": 1}}),
        ])
    }

    /// Ends the run while a message is still open.
    async fn chat(Json(body): Json<Value>) -> Response {
        sse(&[
            serde_json::json!({"type": "RUN_STARTED", "threadId": body["threadId"], "runId": body["runId"]}),
            serde_json::json!({"type": "TEXT_MESSAGE_START", "messageId": "m1", "role": "assistant"}),
            serde_json::json!({"type": "RUN_FINISHED", "threadId": body["threadId"], "runId": body["runId"]}),
        ])
    }

    async fn workflow() -> (StatusCode, Json<Value>) {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "threadId, runId, workflowId, and inputData are required"})),
        )
    }

    pub async fn start() -> (SocketAddr, oneshot::Sender<()>) {
        let app = Router::new()
            .route("/api/agents/flight-search", post(flight_search))
            .route("/api/agents/chat", post(chat))
            .route("/api/agents/workflow", post(workflow));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind to address");
        let addr = listener.local_addr().expect("failed to get local address");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("server error");
        });

        (addr, shutdown_tx)
    }
}

async fn setup_test() -> (RelayClient, oneshot::Sender<()>) {
    let _ = env_logger::try_init();
    let (addr, shutdown_tx): (SocketAddr, _) = mock_server::start().await;
    let client = RelayClient::new(&format!("http://{addr}"))
        .expect("valid url")
        .with_debug(true);
    (client, shutdown_tx)
}

fn params() -> SearchParams {
    serde_json::from_value(json!({"origin": "NYC", "destination": "SFO", "departureDate": "2025-07-20"}))
        .expect("params")
}

#[tokio::test]
async fn flight_search_yields_a_verified_run() {
    let (client, _shutdown) = setup_test().await;
    let ids = RunIds::new("thread-1", "run-1");

    let stream = client.flight_search(&ids, &params(), None).await.expect("run starts");
    let events = collect_run(stream).await.expect("run is well formed");

    assert_eq!(events.len(), 8);
    match (&events[0], events.last()) {
        (Event::RunStarted(start), Some(Event::RunFinished(finish))) => {
            assert_eq!(start.thread_id, "thread-1");
            assert_eq!(finish.run_id, "run-1");
            assert_eq!(finish.result, Some(json!({"success": true, "toolCallCount": 1})));
        }
        other => panic!("unexpected run bounds: {other:?}"),
    }
    match &events[3] {
        Event::ToolCallArgs(args) => assert!(args.delta.contains("\"departureDate\":\"2025-07-20\"")),
        other => panic!("expected tool args, got {other:?}"),
    }
}

#[tokio::test]
async fn protocol_violation_surfaces_as_error() {
    let (client, _shutdown) = setup_test().await;

    let mut stream = client.chat(&RunIds::random(), "hello").await.expect("run starts");
    assert!(matches!(stream.next().await, Some(Ok(Event::RunStarted(_)))));
    assert!(matches!(stream.next().await, Some(Ok(Event::TextMessageStart(_)))));
    match stream.next().await {
        Some(Err(ClientError::Protocol { message })) => {
            assert!(message.contains("text messages are still active"), "{message}");
        }
        other => panic!("expected a protocol error, got {other:?}"),
    }
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn rejected_request_returns_status() {
    let (client, _shutdown) = setup_test().await;

    let result = client.workflow(&RunIds::random(), "flight-booking-workflow", &json!({})).await;
    match result {
        Err(ClientError::Status { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("inputData are required"));
        }
        Err(other) => panic!("expected a status error, got {other:?}"),
        Ok(_) => panic!("expected a status error"),
    }
}

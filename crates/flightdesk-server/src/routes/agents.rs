//! Streamed agent runs. Each handler validates the body, then answers with
//! the run's SSE stream.

use super::{json_body, AppState};
use crate::agent::{AgentContext, RequestMetadata};
use crate::error::ApiError;
use crate::integrations::axum::sse_response;
use crate::relay::{RunInput, RunRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use flightdesk_core::flight::SearchParams;
use flightdesk_core::JsonValue;
use serde::Deserialize;

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/flight-search", post(flight_search))
        .route("/chat", post(chat))
        .route("/workflow", post(workflow))
}

/// Body shared by the three run endpoints. Blank strings count as missing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunBody {
    /// Conversation thread.
    pub thread_id: Option<String>,
    /// Run id chosen by the client.
    pub run_id: Option<String>,
    /// Free text.
    pub message: Option<String>,
    /// Structured search.
    pub search_params: Option<SearchParams>,
    /// Workflow to run.
    pub workflow_id: Option<String>,
    /// Workflow input.
    pub input_data: Option<JsonValue>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RunBody {
    /// Request for `/flight-search`: structured parameters win over a message.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] when the ids or both payloads are missing.
    pub fn into_flight_search(self) -> Result<RunRequest, ApiError> {
        let (Some(thread_id), Some(run_id)) = (present(self.thread_id), present(self.run_id)) else {
            return Err(ApiError::Validation("threadId and runId are required".into()));
        };
        let message = present(self.message);
        let input = match (self.search_params, message) {
            (Some(params), message) => RunInput::Search { params, message },
            (None, Some(message)) => RunInput::Ask(message),
            (None, None) => {
                return Err(ApiError::Validation(
                    "Either searchParams or message is required".into(),
                ));
            }
        };
        Ok(RunRequest::new(thread_id, run_id, input))
    }

    /// Request for `/chat`.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] unless ids and message are present.
    pub fn into_chat(self) -> Result<RunRequest, ApiError> {
        match (present(self.thread_id), present(self.run_id), present(self.message)) {
            (Some(thread_id), Some(run_id), Some(message)) => {
                Ok(RunRequest::new(thread_id, run_id, RunInput::Chat(message)))
            }
            _ => Err(ApiError::Validation(
                "threadId, runId, and message are required".into(),
            )),
        }
    }

    /// Request for `/workflow`.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] unless ids, workflow id and input are present.
    pub fn into_workflow(self) -> Result<RunRequest, ApiError> {
        let input_data = self.input_data.filter(|v| !v.is_null());
        match (
            present(self.thread_id),
            present(self.run_id),
            present(self.workflow_id),
            input_data,
        ) {
            (Some(thread_id), Some(run_id), Some(workflow_id), Some(input_data)) => Ok(
                RunRequest::new(thread_id, run_id, RunInput::Workflow { workflow_id, input_data }),
            ),
            _ => Err(ApiError::Validation(
                "threadId, runId, workflowId, and inputData are required".into(),
            )),
        }
    }
}

/// Starts the run and echoes its request id as `x-request-id`.
fn stream(state: &AppState, headers: &HeaderMap, request: RunRequest) -> Response {
    let ctx = AgentContext::with_metadata(RequestMetadata::from_headers(headers));
    let request_id = ctx
        .metadata()
        .request_id
        .as_deref()
        .and_then(|id| HeaderValue::from_str(id).ok());
    let mut response = sse_response(state.relay().start(request, ctx));
    if let Some(id) = request_id {
        response.headers_mut().insert("x-request-id", id);
    }
    response
}

async fn flight_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RunBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(body)?.into_flight_search()?;
    Ok(stream(&state, &headers, request))
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RunBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(body)?.into_chat()?;
    Ok(stream(&state, &headers, request))
}

async fn workflow(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RunBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(body)?.into_workflow()?;
    Ok(stream(&state, &headers, request))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{json, post, text};
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    fn events(body: &str) -> Vec<Value> {
        body.split_terminator("\n\n")
            .map(|frame| {
                let data = frame.strip_prefix("data: ").expect("data frame");
                serde_json::from_str(data).expect("json event")
            })
            .collect()
    }

    fn types(events: &[Value]) -> Vec<&str> {
        events.iter().map(|e| e["type"].as_str().expect("type tag")).collect()
    }

    #[test]
    fn flight_search_body_selection() {
        let body: RunBody = serde_json::from_value(json!({
            "threadId": "t", "runId": "r", "message": "history please",
            "searchParams": {"origin": "NYC", "destination": "SFO", "departureDate": "2025-07-20"}
        }))
        .expect("body");
        let request = body.into_flight_search().expect("valid");
        assert_matches!(request.input, RunInput::Search { message: Some(ref m), .. } if m == "history please");

        let body: RunBody =
            serde_json::from_value(json!({"threadId": "t", "runId": "r", "message": "hi"})).expect("body");
        assert_matches!(body.into_flight_search().map(|r| r.input), Ok(RunInput::Ask(_)));

        let body: RunBody = serde_json::from_value(json!({"threadId": "t", "runId": " "})).expect("body");
        assert_matches!(body.into_flight_search(), Err(ApiError::Validation(m)) if m == "threadId and runId are required");
    }

    #[test]
    fn workflow_needs_input_data() {
        let body: RunBody = serde_json::from_value(json!({
            "threadId": "t", "runId": "r", "workflowId": "flight-booking-workflow", "inputData": null
        }))
        .expect("body");
        assert_matches!(body.into_workflow(), Err(ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn flight_search_streams_a_full_run() {
        let response = post(
            "/api/agents/flight-search",
            &json!({
                "threadId": "thread-1",
                "runId": "run-1",
                "searchParams": {"origin": "NYC", "destination": "SFO", "departureDate": "2025-07-20"}
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");

        let events = events(&text(response).await);
        let types = types(&events);
        assert_eq!(types.first(), Some(&"RUN_STARTED"));
        assert_eq!(types.last(), Some(&"RUN_FINISHED"));
        assert_eq!(events[0]["threadId"], "thread-1");

        let start = types.iter().position(|t| *t == "TOOL_CALL_START").expect("tool call");
        assert_eq!(
            &types[start..start + 5],
            ["TOOL_CALL_START", "TOOL_CALL_ARGS", "TOOL_CALL_RESULT", "TOOL_CALL_END", "CUSTOM"]
        );
        assert_eq!(events[start]["toolCallName"], "search-flights-enhanced");
        assert_eq!(events[start + 4]["name"], "FLIGHT_SEARCH_RESULT");
        assert_eq!(events[start + 4]["value"]["totalResults"], 6);
        assert_eq!(
            events.last().map(|e| e["result"].clone()),
            Some(json!({"success": true, "toolCallCount": 1}))
        );
    }

    #[tokio::test]
    async fn flight_search_without_payload_is_400() {
        let (status, body) = json(
            post("/api/agents/flight-search", &json!({"threadId": "t", "runId": "r"})).await,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Either searchParams or message is required");
    }

    #[tokio::test]
    async fn chat_requires_message() {
        let (status, body) = json(post("/api/agents/chat", &json!({"threadId": "t", "runId": "r"})).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "threadId, runId, and message are required");
    }

    #[tokio::test]
    async fn chat_streams_text() {
        let response = post(
            "/api/agents/chat",
            &json!({"threadId": "t", "runId": "r", "message": "hello"}),
        )
        .await;
        let events = events(&text(response).await);
        assert_eq!(
            types(&events)
                .into_iter()
                .filter(|t| *t != "TEXT_MESSAGE_CONTENT")
                .collect::<Vec<_>>(),
            ["RUN_STARTED", "TEXT_MESSAGE_START", "TEXT_MESSAGE_END", "RUN_FINISHED"]
        );
    }

    #[tokio::test]
    async fn run_responses_carry_the_request_id() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let response = super::super::test_support::app()
            .oneshot(
                Request::post("/api/agents/chat")
                    .header("content-type", "application/json")
                    .header("x-request-id", "req-42")
                    .body(Body::from(json!({"threadId": "t", "runId": "r", "message": "hi"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-42");

        let generated = post(
            "/api/agents/chat",
            &json!({"threadId": "t", "runId": "r", "message": "hi"}),
        )
        .await;
        let id = generated.headers()["x-request-id"].to_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn unknown_workflow_ends_in_run_error() {
        let response = post(
            "/api/agents/workflow",
            &json!({"threadId": "t", "runId": "r", "workflowId": "nope", "inputData": {}}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let events = events(&text(response).await);
        assert_eq!(types(&events), ["RUN_STARTED", "RUN_ERROR"]);
        assert_eq!(events[1]["code"], "WORKFLOW_ERROR");
        assert_eq!(events[1]["message"], "Workflow 'nope' not found");
    }
}

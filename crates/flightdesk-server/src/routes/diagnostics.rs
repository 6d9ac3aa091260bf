//! `/api/test/*`: run the flight tools directly, bypassing the agent.

use super::{json_body, AppState};
use crate::error::{ApiError, ToolError};
use crate::tools::{ToolKind, ToolOutput};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use flightdesk_core::flight::SearchParams;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/live-flights", post(live_flights))
        .route("/weather-flights", post(weather_flights))
        .route("/historical-flights", post(historical_flights))
        .route("/enhanced-flights", post(enhanced_flights))
        .route("/all-tools", post(all_tools))
}

/// Body of every test endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolTestRequest {
    /// Parameters handed to the tool.
    pub search_params: Option<SearchParams>,
}

impl ToolTestRequest {
    fn params(self) -> Result<SearchParams, ApiError> {
        self.search_params
            .ok_or_else(|| ApiError::Validation("searchParams is required".into()))
    }
}

/// Result of a single-tool test.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolTestResponse {
    /// Tool display name.
    pub tool: String,
    /// What kind of data it returns.
    pub data_type: String,
    /// The tool's output.
    pub result: ToolOutput,
}

/// Outcome of one branch of `/all-tools`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolReport {
    /// Tool display name.
    pub name: String,
    /// What kind of data it returns.
    pub data_type: String,
    /// `fulfilled` or `rejected`.
    pub status: String,
    /// Flights returned, 0 when rejected.
    pub flight_count: usize,
    /// Provider, or `Error` when rejected.
    pub provider: String,
    /// Failure message when rejected.
    pub error: Option<String>,
}

impl ToolReport {
    fn new(kind: ToolKind, outcome: Result<ToolOutput, ToolError>) -> Self {
        let (status, flight_count, provider, error) = match outcome {
            Ok(output) => ("fulfilled", output.flights.len(), output.provider, None),
            Err(e) => ("rejected", 0, "Error".to_string(), Some(e.to_string())),
        };
        Self {
            name: kind.label().to_string(),
            data_type: kind.data_type().to_string(),
            status: status.to_string(),
            flight_count,
            provider,
            error,
        }
    }
}

/// Body of `/all-tools`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AllToolsResponse {
    /// Fixed confirmation text.
    pub message: String,
    /// One report per tool, in [`ToolKind::ALL`] order.
    pub tools: Vec<ToolReport>,
}

fn tool_error(state: &AppState, err: ToolError) -> ApiError {
    match err {
        ToolError::Validation(_) | ToolError::InvalidArguments { .. } => {
            ApiError::Validation(err.to_string())
        }
        other => state.internal_error(other),
    }
}

async fn run_tool(
    kind: ToolKind,
    state: &AppState,
    body: Result<Json<ToolTestRequest>, JsonRejection>,
) -> Result<Json<ToolTestResponse>, ApiError> {
    let params = json_body(body)?.params()?;
    tracing::info!(tool = %kind, "testing tool");
    let result = state
        .tools()
        .execute(kind, &params)
        .await
        .map_err(|e| tool_error(state, e))?;
    Ok(Json(ToolTestResponse {
        tool: kind.label().to_string(),
        data_type: kind.data_type().to_string(),
        result,
    }))
}

async fn live_flights(
    State(state): State<AppState>,
    body: Result<Json<ToolTestRequest>, JsonRejection>,
) -> Result<Json<ToolTestResponse>, ApiError> {
    run_tool(ToolKind::LiveFlights, &state, body).await
}

async fn weather_flights(
    State(state): State<AppState>,
    body: Result<Json<ToolTestRequest>, JsonRejection>,
) -> Result<Json<ToolTestResponse>, ApiError> {
    run_tool(ToolKind::WeatherFlights, &state, body).await
}

async fn historical_flights(
    State(state): State<AppState>,
    body: Result<Json<ToolTestRequest>, JsonRejection>,
) -> Result<Json<ToolTestResponse>, ApiError> {
    run_tool(ToolKind::HistoricalFlights, &state, body).await
}

async fn enhanced_flights(
    State(state): State<AppState>,
    body: Result<Json<ToolTestRequest>, JsonRejection>,
) -> Result<Json<ToolTestResponse>, ApiError> {
    run_tool(ToolKind::EnhancedFlights, &state, body).await
}

async fn all_tools(
    State(state): State<AppState>,
    body: Result<Json<ToolTestRequest>, JsonRejection>,
) -> Result<Json<AllToolsResponse>, ApiError> {
    let params = json_body(body)?.params()?;
    let tools = state.tools();
    let outcomes = join_all(ToolKind::ALL.map(|kind| tools.execute(kind, &params))).await;
    let tools = ToolKind::ALL
        .into_iter()
        .zip(outcomes)
        .map(|(kind, outcome)| ToolReport::new(kind, outcome))
        .collect();
    Ok(Json(AllToolsResponse {
        message: "All tools tested".to_string(),
        tools,
    }))
}

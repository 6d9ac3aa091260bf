//! HTTP surface of the service.
//!
//! | route | handler |
//! |---|---|
//! | `GET /health` | liveness and agent status |
//! | `POST /api/flights/search`, `GET /api/flights/:id` | [`flights`] |
//! | `POST /api/agents/{flight-search,chat,workflow}` | [`agents`], SSE |
//! | `POST /api/test/*` | [`diagnostics`], tool debugging |

pub mod agents;
pub mod diagnostics;
pub mod flights;

use crate::agent::Agent;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::relay::Relay;
use crate::tools::ToolRegistry;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use http::header::{InvalidHeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state of every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
    relay: Relay,
    tools: Arc<ToolRegistry>,
}

impl AppState {
    /// State serving `agent` and `tools` under `config`.
    #[must_use]
    pub fn new(config: ServerConfig, agent: Arc<dyn Agent>, tools: Arc<ToolRegistry>) -> Self {
        let relay = Relay::new(agent, config.pacing);
        Self {
            config: Arc::new(config),
            relay,
            tools,
        }
    }

    /// Server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The run relay.
    #[must_use]
    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// The tool registry.
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Internal error, with detail only where the environment allows it.
    pub(crate) fn internal_error(&self, err: impl std::fmt::Display) -> ApiError {
        ApiError::internal(err, self.config.environment.exposes_errors())
    }
}

/// All routes, with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/flights", flights::router())
        .nest("/api/agents", agents::router())
        .nest("/api/test", diagnostics::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the single browser origin, with credentials.
///
/// # Errors
///
/// Fails if `origin` is not a valid header value.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    Ok(CorsLayer::new()
        .allow_origin(HeaderValue::from_str(origin)?)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, AUTHORIZATION]))
}

/// Decodes a JSON body, turning rejections into 400s.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        ApiError::Validation(format!("invalid request body: {}", rejection.body_text()))
    })
}

/// Body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: String,
    /// RFC 3339 server time.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Agent name and health.
    pub agent: AgentHealth,
}

/// Agent part of [`HealthResponse`].
#[derive(Debug, Serialize, Deserialize)]
pub struct AgentHealth {
    /// Agent name.
    pub name: String,
    /// `healthy`, `degraded: ..` or `unhealthy: ..`.
    pub status: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let agent = state.relay.agent();
    let status = match agent.health().await {
        Ok(status) => status.to_string(),
        Err(e) => format!("error: {e}"),
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        version: env!("CARGO_PKG_VERSION").to_string(),
        agent: AgentHealth {
            name: agent.name().to_string(),
            status,
        },
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::{get, json};
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn health_reports_ok_and_agent() {
        let (status, body) = json(get("/health").await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
        assert_eq!(body["agent"]["name"], "scripted");
        assert!(body["agent"]["status"].as_str().is_some_and(|s| s.starts_with("degraded")));
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        assert_eq!(get("/api/nothing").await.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn cors_rejects_bad_origin() {
        assert!(cors_layer("http://localhost:5173").is_ok());
        assert!(cors_layer("bad\norigin").is_err());
    }
}

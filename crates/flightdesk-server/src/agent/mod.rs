//! Agent abstraction: the LLM-driven component that picks and runs flight
//! tools.
//!
//! [`Agent::generate`] returns the finished answer together with every tool
//! call it made, which the relay then replays as events. Searches and chat
//! both go through it; only the [`ToolChoice`] differs.
//!
//! Two implementations ship with the server:
//!
//! - [`OpenRouterAgent`]: any OpenAI-compatible chat-completions endpoint
//! - [`ScriptedAgent`]: deterministic and offline, used without an API key
//!
//! # Example
//!
//! ```rust,no_run
//! use flightdesk_server::agent::{Agent, AgentContext, GenerateOptions, ScriptedAgent, ToolChoice};
//! use flightdesk_server::tools::ToolRegistry;
//! use flightdesk_core::types::ChatMessage;
//! use std::sync::Arc;
//!
//! # async fn run() -> flightdesk_server::error::AgentResult<()> {
//! let agent = ScriptedAgent::new(Arc::new(ToolRegistry::offline()));
//! let generation = agent
//!     .generate(
//!         &[ChatMessage::user(r#"Find flights {"origin":"NYC","destination":"SFO","departureDate":"2025-07-20"}"#)],
//!         &GenerateOptions::new(ToolChoice::Required),
//!         &AgentContext::empty(),
//!     )
//!     .await?;
//! assert_eq!(generation.tool_calls.len(), 1);
//! # Ok(())
//! # }
//! ```

mod openrouter;
mod scripted;

pub use openrouter::OpenRouterAgent;
pub use scripted::ScriptedAgent;

use crate::error::AgentResult;
use crate::tools::{ToolKind, ToolOutput};
use async_trait::async_trait;
use flightdesk_core::types::{ChatMessage, ToolCallId};
use flightdesk_core::JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// System prompt for the flight booking assistant.
pub const INSTRUCTIONS: &str = "You are a flight search assistant with access to multiple flight search tools. When a user asks you to search for flights, you MUST choose and use ONE of the available tools.

IMPORTANT: Always call one of the flight search tools when users provide flight search criteria. Do not provide flight information without using a tool first.

Your available tools:
- search-live-flights: Use real-time flight data from OpenSky Network (FREE)
- search-flights-weather: Include weather data and delay predictions (FREE)
- search-flights-historical: Show historical performance and price trends (FREE)
- search-flights-enhanced: Enhanced mock data with realistic details (FALLBACK)

Choose the most appropriate tool based on the user's needs:
- For real-time flight tracking: use search-live-flights
- For weather-sensitive travel: use search-flights-weather
- For reliability analysis: use search-flights-historical
- For general searches: use search-flights-enhanced

When you receive flight search parameters, immediately call the most appropriate tool with the exact parameters provided.";

/// Per-request context handed to the agent.
///
/// Carries the run's cancellation token, request metadata, and the
/// `tracing` span every log line of the run is recorded under.
///
/// # Cancellation
///
/// Cancellation is cooperative. The relay cancels the context when the SSE
/// client goes away; long operations should race against it:
///
/// ```rust,ignore
/// tokio::select! {
///     _ = ctx.cancelled() => return Err(AgentError::Aborted { reason: "client disconnect".into() }),
///     response = request.send() => response,
/// }
/// ```
///
/// Cloning is cheap and shares the token.
#[derive(Clone)]
pub struct AgentContext {
    cancellation: CancellationToken,
    metadata: Arc<RequestMetadata>,
    span: tracing::Span,
}

impl AgentContext {
    /// Create a context from a cancellation token and metadata.
    #[must_use]
    pub fn new(cancellation: CancellationToken, metadata: RequestMetadata) -> Self {
        let span = tracing::info_span!(
            "run",
            request_id = metadata.request_id.as_deref().unwrap_or("-"),
            trace_id = metadata.trace_id.as_deref().unwrap_or("-"),
        );
        Self {
            cancellation,
            metadata: Arc::new(metadata),
            span,
        }
    }

    /// Create a context with its own cancellation token.
    #[must_use]
    pub fn with_metadata(metadata: RequestMetadata) -> Self {
        Self::new(CancellationToken::new(), metadata)
    }

    /// Context with empty metadata, for tests and background calls.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_metadata(RequestMetadata::default())
    }

    /// Completes when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }

    /// Request cancellation of the run.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Request metadata.
    #[must_use]
    pub fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }

    /// Span the run's logs belong to.
    #[must_use]
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("is_cancelled", &self.is_cancelled())
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl Default for AgentContext {
    fn default() -> Self {
        Self::empty()
    }
}

/// Metadata taken from the incoming HTTP request.
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    /// Headers with lowercase names.
    pub headers: HashMap<String, String>,
    /// `x-request-id`, or a generated id.
    pub request_id: Option<String>,
    /// Trace id from `traceparent` or `x-trace-id`.
    pub trace_id: Option<String>,
}

impl RequestMetadata {
    /// Metadata with the given headers; request and trace ids are read from
    /// them when present.
    #[must_use]
    pub fn with_headers(headers: HashMap<String, String>) -> Self {
        let request_id = headers.get("x-request-id").cloned();
        let trace_id = headers
            .get("x-trace-id")
            .cloned()
            .or_else(|| headers.get("traceparent").and_then(|tp| trace_id_from_traceparent(tp)));
        Self {
            headers,
            request_id,
            trace_id,
        }
    }

    /// Set the request id.
    #[must_use]
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Trace id field of a W3C `traceparent` header.
fn trace_id_from_traceparent(header: &str) -> Option<String> {
    let mut parts = header.trim().split('-');
    let _version = parts.next()?;
    let trace_id = parts.next()?;
    (trace_id.len() == 32 && trace_id.bytes().all(|b| b.is_ascii_hexdigit()))
        .then(|| trace_id.to_ascii_lowercase())
}

/// Whether and how the agent may call tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoice {
    /// The model decides.
    #[default]
    Auto,
    /// At least one tool call is mandatory.
    Required,
    /// Tools are not offered.
    None,
}

impl ToolChoice {
    /// Value of the `tool_choice` request field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::Required => "required",
            ToolChoice::None => "none",
        }
    }
}

/// Options for one [`Agent::generate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Tool policy for this call.
    pub tool_choice: ToolChoice,
    /// Maximum model round trips, tool rounds included.
    pub max_steps: usize,
}

impl GenerateOptions {
    /// Options with the given tool choice and the default step limit.
    #[must_use]
    pub fn new(tool_choice: ToolChoice) -> Self {
        Self {
            tool_choice,
            ..Self::default()
        }
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            tool_choice: ToolChoice::Auto,
            max_steps: 5,
        }
    }
}

/// One executed tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Call id, as assigned by the model or generated.
    pub id: ToolCallId,
    /// Tool that ran.
    pub kind: ToolKind,
    /// Arguments as sent by the model.
    pub args: JsonValue,
    /// What the tool returned.
    pub output: ToolOutput,
}

/// Result of [`Agent::generate`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Generation {
    /// Final assistant text.
    pub text: String,
    /// Tool calls in the order they were made.
    pub tool_calls: Vec<ToolInvocation>,
}

impl Generation {
    /// Whether any tool ran.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// An LLM-backed assistant that can call the flight tools.
///
/// # Contract
///
/// - With [`ToolChoice::Required`], a successful `generate` returns at least
///   one tool call. Returning none is a protocol violation.
/// - Tool calls are executed by the agent; the relay only replays them.
/// - Implementations should stop promptly once `ctx` is cancelled.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Answer `messages`, running tools as needed.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`](crate::error::AgentError) when the model call
    /// or a tool fails, or the run is cancelled.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
        ctx: &AgentContext,
    ) -> AgentResult<Generation>;

    /// Health check for the `/health` endpoint.
    async fn health(&self) -> AgentResult<HealthStatus> {
        Ok(HealthStatus::Healthy)
    }

    /// Agent name for logs.
    fn name(&self) -> &'static str {
        "agent"
    }
}

/// Health check status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational with reduced capability.
    Degraded {
        /// Human-readable reason.
        reason: String,
    },
    /// Cannot handle requests.
    Unhealthy {
        /// Human-readable reason.
        reason: String,
    },
}

impl HealthStatus {
    /// Whether requests can be served.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded { .. })
    }

    /// Create a degraded status.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    /// Create an unhealthy status.
    pub fn unhealthy(reason: impl Into<String>) -> Self {
        Self::Unhealthy {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded { reason } => write!(f, "degraded: {reason}"),
            Self::Unhealthy { reason } => write!(f, "unhealthy: {reason}"),
        }
    }
}

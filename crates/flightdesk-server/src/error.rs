//! Error hierarchy for the flightdesk server.
//!
//! Each layer has its own enum: [`ToolError`] for flight providers,
//! [`EncodeError`] for SSE framing, [`StateError`] for run-state patches,
//! [`AgentError`] for anything that ends a run, and [`ApiError`] for plain
//! JSON endpoints. A run never surfaces an error to the HTTP layer once the
//! stream has started; it is turned into a `RUN_ERROR` event instead.
//!
//! # Example
//!
//! ```rust
//! use flightdesk_server::error::{AgentError, ToolError};
//!
//! fn describe(err: &AgentError) -> &'static str {
//!     match err {
//!         AgentError::Aborted { .. } => "client went away",
//!         AgentError::Tool(ToolError::UnknownTool { .. }) => "model asked for a tool we lack",
//!         _ => "run failed",
//!     }
//! }
//! ```

use flightdesk_core::CoreError;
use thiserror::Error;

/// Errors that terminate an agent run.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AgentError {
    /// Run was cancelled, usually because the SSE client disconnected.
    #[error("run aborted: {reason}")]
    Aborted {
        /// Human-readable reason for the abort.
        reason: String,
    },

    /// An emission broke event ordering, or an agent broke its contract
    /// (for example no tool call when one was required).
    #[error("protocol violation in {event_type}: {violation}")]
    ProtocolViolation {
        /// The event type (or operation) that triggered the violation.
        event_type: &'static str,
        /// Description of what constraint was violated.
        violation: String,
    },

    /// Tool lookup or execution failed.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// LLM provider call failed.
    #[error("{service} request failed: {message}")]
    Upstream {
        /// Upstream service name.
        service: &'static str,
        /// Status and body, or the transport error.
        message: String,
    },

    /// Workflow could not be found or a step failed.
    #[error("{message}")]
    Workflow {
        /// Error message shown to the client.
        message: String,
    },

    /// Run-state update failed.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// HTTP or transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Error raised by an agent implementation.
    #[error("{message}")]
    Custom {
        /// Error message.
        message: String,
        /// Optional source error for chaining.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Unexpected condition inside the server.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal failure.
        message: String,
        /// Location in code where the error originated (`file:line`).
        location: &'static str,
    },
}

impl AgentError {
    /// Create a custom error with a message.
    #[must_use]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
            source: None,
        }
    }

    /// Create a custom error with a message and source.
    #[must_use]
    pub fn custom_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Custom {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a workflow error.
    #[must_use]
    pub fn workflow(message: impl Into<String>) -> Self {
        Self::Workflow {
            message: message.into(),
        }
    }

    /// Create an internal error with location tracking.
    ///
    /// Use the `internal_error!` macro instead of calling this directly.
    #[doc(hidden)]
    #[must_use]
    pub fn internal(message: impl Into<String>, location: &'static str) -> Self {
        Self::Internal {
            message: message.into(),
            location,
        }
    }

    /// Check if this error represents a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Aborted { .. } | Self::Transport(TransportError::ClientDisconnected { .. })
        )
    }
}

/// Macro for creating internal errors with automatic location tracking.
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::AgentError::internal($msg, concat!(file!(), ":", line!()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::AgentError::internal(format!($fmt, $($arg)*), concat!(file!(), ":", line!()))
    };
}

/// Errors from the flight search tools.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ToolError {
    /// Tool name is not one of the registered tools.
    #[error("unknown tool '{name}'")]
    UnknownTool {
        /// The requested tool name.
        name: String,
    },

    /// Arguments could not be decoded into search parameters.
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments {
        /// Tool id.
        tool: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// Arguments decoded but failed validation.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// A public API call failed. Providers turn this into a fallback result.
    #[error("{service} error: {message}")]
    Upstream {
        /// Upstream service name.
        service: &'static str,
        /// Status or transport error.
        message: String,
    },
}

impl ToolError {
    /// Create an upstream error.
    #[must_use]
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
        }
    }
}

/// Errors during event encoding and serialization.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EncodeError {
    /// JSON serialization failed.
    #[error("JSON serialization failed for {event_type}: {source}")]
    Json {
        /// The event type being serialized.
        event_type: &'static str,
        /// The underlying `serde_json` error.
        #[source]
        source: serde_json::Error,
    },

    /// Event data exceeds maximum allowed size.
    #[error("event exceeds max size: {size} bytes > {max} bytes limit")]
    EventTooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },
}

impl EncodeError {
    /// Create a JSON encoding error.
    #[must_use]
    pub fn json(event_type: &'static str, source: serde_json::Error) -> Self {
        Self::Json { event_type, source }
    }
}

/// Errors during run-state operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StateError {
    /// State serialization/deserialization failed.
    #[error("state serialization failed: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A patch did not apply to the target document.
    #[error("state patch failed: {reason}")]
    Patch {
        /// What the patch could not do.
        reason: String,
    },
}

/// HTTP and transport-level errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// Request timed out.
    #[error("request timed out after {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        duration_ms: u64,
    },

    /// Client disconnected before response completed.
    #[error("client disconnected: {reason}")]
    ClientDisconnected {
        /// Reason or context for the disconnect.
        reason: String,
    },
}

/// Errors returned by the plain JSON endpoints.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    /// Request body is missing fields or malformed. Maps to 400.
    #[error("{0}")]
    Validation(String),

    /// Resource does not exist. Maps to 404.
    #[error("{0}")]
    NotFound(String),

    /// Anything else. Maps to 500; `detail` is only exposed in development.
    #[error("internal server error")]
    Internal {
        /// Error text shown when running in development mode.
        detail: Option<String>,
    },
}

impl ApiError {
    /// Build an internal error, keeping the detail only when `expose` is set.
    #[must_use]
    pub fn internal(err: impl std::fmt::Display, expose: bool) -> Self {
        Self::Internal {
            detail: expose.then(|| err.to_string()),
        }
    }

    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Internal { .. } => 500,
        }
    }

    /// JSON body for this error.
    #[must_use]
    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::Validation(message) | Self::NotFound(message) => {
                serde_json::json!({ "error": message })
            }
            Self::Internal { detail } => serde_json::json!({
                "error": "Internal server error",
                "message": detail.as_deref().unwrap_or("Something went wrong"),
            }),
        }
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Result type alias for encoding operations.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Result type alias for state operations.
pub type StateResult<T> = Result<T, StateError>;

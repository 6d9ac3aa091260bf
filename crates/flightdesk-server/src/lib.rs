//! Flight search service that streams agent runs to the browser as typed
//! Server-Sent Events.
//!
//! # Architecture
//!
//! 1. **[`tools`]**: four flight search tools behind a [`ToolRegistry`]
//! 2. **[`agent`]**: the [`Agent`] trait that picks and runs those tools
//! 3. **[`relay`]**: turns one agent run into an ordered event stream
//! 4. **[`routes`]**: the axum HTTP surface (REST, SSE, diagnostics)
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use flightdesk_server::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn serve() -> std::io::Result<()> {
//! let tools = Arc::new(ToolRegistry::offline());
//! let agent = Arc::new(ScriptedAgent::new(Arc::clone(&tools)));
//! let app = flightdesk_server::routes::router(AppState::new(ServerConfig::default(), agent, tools));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3001").await?;
//! axum::serve(listener, app).await
//! # }
//! ```
//!
//! # State Management
//!
//! Each run tracks its progress in a [`StateManager`], which reports every
//! change as a JSON Patch (RFC 6902):
//!
//! ```rust
//! use flightdesk_server::state::{RunState, StateManager};
//!
//! let state = StateManager::new(RunState::default());
//! let delta = state.update(|s| s.message_count = 1).expect("update should succeed");
//! assert_eq!(delta.len(), 1);
//! ```
//!
//! # Features
//!
//! - `axum-integration` (default): the HTTP layer and the `flightdesk` binary

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod config;
pub mod encoder;
pub mod error;
pub mod relay;
pub mod search;
pub mod state;
pub mod tools;
pub mod workflow;

#[cfg(feature = "axum-integration")]
pub mod integrations;
#[cfg(feature = "axum-integration")]
pub mod routes;

pub use agent::{Agent, AgentContext, HealthStatus, OpenRouterAgent, RequestMetadata, ScriptedAgent};
pub use config::{Pacing, ServerConfig};
pub use encoder::{encode_sse, EventEncoder};
pub use error::{AgentError, AgentResult, ApiError, EncodeError, StateError, ToolError};
pub use relay::{Relay, RunInput, RunKind, RunRequest};
pub use state::{RunState, StateManager, StatePatch};
pub use tools::{ToolKind, ToolOutput, ToolRegistry};

pub use flightdesk_core;

pub use flightdesk_core::event::{BaseEvent, Event, EventType};
pub use flightdesk_core::flight::SearchParams;
pub use flightdesk_core::types::{MessageId, RunId, ThreadId};

/// Prelude module for convenient imports.
///
/// ```rust
/// use flightdesk_server::prelude::*;
/// ```
pub mod prelude {
    pub use crate::agent::{Agent, AgentContext, GenerateOptions, Generation, ScriptedAgent, ToolChoice};
    pub use crate::config::{Pacing, ServerConfig};
    pub use crate::error::{AgentError, AgentResult, ApiError, ToolError};
    pub use crate::relay::{Relay, RunInput, RunRequest};
    pub use crate::tools::{ToolKind, ToolRegistry};

    #[cfg(feature = "axum-integration")]
    pub use crate::routes::AppState;

    pub use flightdesk_core::event::{Event, EventType};
    pub use flightdesk_core::flight::SearchParams;
    pub use flightdesk_core::types::{ChatMessage, RunId, ThreadId};

    pub use async_trait::async_trait;
}

#[cfg(test)]
mod tests {
    #[test]
    fn prelude_imports_work() {
        use crate::prelude::*;

        fn _assert_agent<T: Agent>() {}
        _assert_agent::<ScriptedAgent>();
        let _ = ToolRegistry::offline();
    }
}

//! Core types shared by the flightdesk server and client.
//!
//! - [`event`]: the streamed run-lifecycle event union and its wire format
//! - [`flight`]: search parameters, flight records and search results
//! - [`types`]: identifiers and chat roles

pub mod error;
pub mod event;
pub mod flight;
pub mod types;

pub use error::{CoreError, Result};

/// Re-export to ensure the same type is used
pub use serde_json::Value as JsonValue;

use serde::{Deserialize, Serialize};

/// State carried by `STATE_SNAPSHOT` events.
pub trait AgentState: 'static + Clone + Send + Sync + for<'de> Deserialize<'de> + Serialize {}
impl AgentState for JsonValue {}

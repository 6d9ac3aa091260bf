//! Per-run state with JSON Patch (RFC 6902) deltas.
//!
//! Every run owns a [`StateManager<RunState>`]. The relay updates it as the
//! run progresses, logs each delta, and sends the final value to the client
//! as a `STATE_SNAPSHOT`.
//!
//! ```rust
//! use flightdesk_server::state::{RunState, RunStep, StateManager};
//!
//! let state = StateManager::new(RunState::default());
//! let patch = state
//!     .update(|s| s.record_tool("search-flights-enhanced"))
//!     .expect("update should succeed");
//!
//! assert!(!patch.is_empty());
//! assert_eq!(state.snapshot().tools_used, vec!["search-flights-enhanced"]);
//! assert_eq!(state.snapshot().current_step, RunStep::Started);
//! ```

mod manager;

pub use manager::{StateManager, StatePatch};

use flightdesk_core::AgentState;
use serde::{Deserialize, Serialize};

/// Coarse progress marker reported in `currentStep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunStep {
    /// `RUN_STARTED` sent.
    #[default]
    Started,
    /// Inside the thinking block.
    Thinking,
    /// Waiting on the agent.
    Generating,
    /// Replaying tool calls and text.
    Streaming,
    /// All content sent.
    Completed,
}

/// State tracked for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    /// Where the run is.
    pub current_step: RunStep,
    /// Tool ids in call order.
    pub tools_used: Vec<String>,
    /// Assistant messages opened so far.
    pub message_count: u32,
}

impl RunState {
    /// Records a tool invocation in call order.
    pub fn record_tool(&mut self, name: impl Into<String>) {
        self.tools_used.push(name.into());
    }
}

impl AgentState for RunState {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_wire_shape() {
        let state = RunState {
            current_step: RunStep::Completed,
            tools_used: vec!["search-live-flights".into()],
            message_count: 1,
        };
        let json = serde_json::to_value(&state).expect("serializes");
        assert_eq!(json["currentStep"], "completed");
        assert_eq!(json["toolsUsed"][0], "search-live-flights");
        assert_eq!(json["messageCount"], 1);
    }

    #[test]
    fn step_change_is_a_single_replace() {
        let manager = StateManager::new(RunState::default());
        let patch = manager
            .update(|s| s.current_step = RunStep::Generating)
            .expect("update should succeed");
        let ops = patch.to_json_ops();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0]["op"], "replace");
        assert_eq!(ops[0]["path"], "/currentStep");
    }
}

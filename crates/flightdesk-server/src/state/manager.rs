use crate::error::{StateError, StateResult};
use flightdesk_core::AgentState;
use json_patch::{diff, Patch};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// One change to a run's state, as RFC 6902 operations.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct StatePatch {
    ops: Patch,
}

impl StatePatch {
    /// True when the update changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.0.is_empty()
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.0.len()
    }

    /// Applies the change to a copy of the state, e.g. one kept by a client.
    ///
    /// # Errors
    ///
    /// [`StateError::Patch`] if an operation does not fit `target`.
    pub fn apply_to(&self, target: &mut serde_json::Value) -> StateResult<()> {
        json_patch::patch(target, &self.ops.0).map_err(|e| StateError::Patch {
            reason: e.to_string(),
        })
    }

    /// The operations as JSON, the shape a `STATE_DELTA` carries.
    #[must_use]
    pub fn to_json_ops(&self) -> Vec<serde_json::Value> {
        self.ops
            .0
            .iter()
            .filter_map(|op| serde_json::to_value(op).ok())
            .collect()
    }
}

#[derive(Debug)]
struct Tracked<S> {
    value: S,
    revision: u64,
}

/// Run state behind a lock. Every update is diffed against the previous
/// value and the revision advances only when something changed.
///
/// Clones share the same state.
#[derive(Debug)]
pub struct StateManager<S: AgentState = serde_json::Value> {
    inner: Arc<Mutex<Tracked<S>>>,
}

impl<S: AgentState> Clone for StateManager<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: AgentState> StateManager<S> {
    /// Starts tracking `initial` at revision 0.
    pub fn new(initial: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Tracked {
                value: initial,
                revision: 0,
            })),
        }
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> S {
        self.inner.lock().value.clone()
    }

    /// Number of updates that produced a non-empty patch.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    /// Runs `change` on the state and returns what it changed.
    ///
    /// # Errors
    ///
    /// [`StateError::Serialization`] if the state cannot be turned into JSON
    /// on either side of the change.
    pub fn update<F>(&self, change: F) -> StateResult<StatePatch>
    where
        F: FnOnce(&mut S),
    {
        let mut tracked = self.inner.lock();
        let before = to_json(&tracked.value, "before")?;
        change(&mut tracked.value);
        let after = to_json(&tracked.value, "after")?;

        let patch = StatePatch {
            ops: diff(&before, &after),
        };
        if !patch.is_empty() {
            tracked.revision += 1;
        }
        Ok(patch)
    }
}

impl<S: AgentState + Default> Default for StateManager<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

fn to_json<S: Serialize>(value: &S, when: &str) -> StateResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| StateError::Serialization {
        reason: format!("run state not serializable {when} update: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unchanged_state_keeps_revision() {
        let manager = StateManager::new(json!({"currentStep": "started"}));
        let patch = manager.update(|_| {}).unwrap();
        assert!(patch.is_empty());
        assert_eq!(manager.revision(), 0);

        manager.update(|s| s["currentStep"] = json!("thinking")).unwrap();
        assert_eq!(manager.revision(), 1);
    }

    #[test]
    fn client_copy_follows_patches() {
        let manager = StateManager::new(json!({"toolsUsed": [], "messageCount": 0}));
        let mut client_copy = manager.snapshot();

        for tool in ["search-flights-enhanced", "get-weather"] {
            let patch = manager
                .update(|s| {
                    if let Some(tools) = s["toolsUsed"].as_array_mut() {
                        tools.push(json!(tool));
                    }
                    s["messageCount"] = json!(1);
                })
                .unwrap();
            patch.apply_to(&mut client_copy).unwrap();
        }

        assert_eq!(client_copy, manager.snapshot());
    }

    #[test]
    fn patch_that_does_not_fit_is_reported() {
        let manager = StateManager::new(json!({"a": {"b": 1}}));
        let patch = manager.update(|s| s["a"]["b"] = json!(2)).unwrap();
        let mut unrelated = json!({"x": 0});
        assert!(matches!(
            patch.apply_to(&mut unrelated),
            Err(StateError::Patch { .. })
        ));
    }

    #[test]
    fn clones_see_each_others_updates() {
        let relay_side = StateManager::new(json!({"messageCount": 0}));
        let logger_side = relay_side.clone();
        relay_side.update(|s| s["messageCount"] = json!(3)).unwrap();
        assert_eq!(logger_side.snapshot()["messageCount"], 3);
        assert_eq!(logger_side.revision(), 1);
    }
}

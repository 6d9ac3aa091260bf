//! Run lifecycle verification.
//!
//! [`EventVerifier`] is a state machine over one run's event stream. It
//! checks that:
//!
//! - the first event is `RUN_STARTED` (or an immediate `RUN_ERROR`)
//! - exactly one terminal event ends the run and nothing follows it
//! - `RUN_FINISHED` repeats the ids of `RUN_STARTED`
//! - messages, tool calls, steps and thinking blocks are opened before use
//!   and closed before `RUN_FINISHED`
//! - a tool call names an open parent message
//!
//! ```rust
//! use flightdesk_client::verify::EventVerifier;
//! use flightdesk_core::event::Event;
//! use flightdesk_core::types::{RunId, ThreadId};
//!
//! let mut verifier = EventVerifier::new();
//! let started: Event = Event::run_started(ThreadId::new("t"), RunId::new("r"));
//! let finished: Event = Event::run_finished(ThreadId::new("t"), RunId::new("r"), None);
//! verifier.verify(&started).unwrap();
//! verifier.verify(&finished).unwrap();
//! assert!(verifier.is_complete());
//! ```

use crate::error::ClientError;
use flightdesk_core::AgentState;
use flightdesk_core::event::{Event, EventType};
use flightdesk_core::types::{RunId, StepId, ThreadId};
use futures::stream::{BoxStream, StreamExt};
use std::collections::{HashMap, HashSet};

/// Event stream verifier for a single run.
#[derive(Debug, Default)]
pub struct EventVerifier {
    /// Ids from `RUN_STARTED`
    run: Option<(ThreadId, RunId)>,
    active_messages: HashSet<String>,
    active_tool_calls: HashSet<String>,
    /// step id -> step name
    active_steps: HashMap<StepId, String>,
    active_thinking: bool,
    active_thinking_message: bool,
    terminal: Option<EventType>,
    received: usize,
    debug: bool,
}

impl EventVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// When enabled, each event type is logged before verification.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// `RUN_FINISHED` or `RUN_ERROR`, once seen.
    pub fn terminal(&self) -> Option<EventType> {
        self.terminal
    }

    /// Whether the run has ended.
    pub fn is_complete(&self) -> bool {
        self.terminal.is_some()
    }

    /// Events accepted so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Checks one event against the run so far.
    ///
    /// # Errors
    ///
    /// [`ClientError::Protocol`] describing the violated rule. The verifier
    /// state is left unchanged by a rejected event.
    pub fn verify<S: AgentState>(&mut self, event: &Event<S>) -> Result<(), ClientError> {
        let event_type = event.event_type();
        if self.debug {
            log::debug!("[VERIFY]: {event_type}");
        }

        if let Some(terminal) = self.terminal {
            return Err(ClientError::protocol(format!(
                "Cannot send '{event_type}': the run already ended with '{terminal}'"
            )));
        }

        if self.received == 0 {
            if !matches!(event_type, EventType::RunStarted | EventType::RunError) {
                return Err(ClientError::protocol(format!(
                    "First event must be 'RUN_STARTED', got '{event_type}'"
                )));
            }
        } else if event_type == EventType::RunStarted {
            return Err(ClientError::protocol(
                "Cannot send 'RUN_STARTED' twice: a stream carries exactly one run",
            ));
        }

        match event {
            Event::RunStarted(e) => {
                self.run = Some((e.thread_id.clone(), e.run_id.clone()));
            }

            Event::RunFinished(e) => {
                if let Some((thread_id, run_id)) = &self.run {
                    if *thread_id != e.thread_id || *run_id != e.run_id {
                        return Err(ClientError::protocol(format!(
                            "'RUN_FINISHED' for {}/{} does not match the started run {thread_id}/{run_id}",
                            e.thread_id, e.run_id
                        )));
                    }
                }
                self.ensure_closed()?;
                self.terminal = Some(event_type);
            }

            Event::RunError(_) => {
                self.terminal = Some(event_type);
            }

            Event::TextMessageStart(e) => {
                let message_id = e.message_id.to_string();
                if self.active_messages.contains(&message_id) {
                    return Err(ClientError::protocol(format!(
                        "Cannot send 'TEXT_MESSAGE_START': message '{message_id}' is already in progress. Complete it with 'TEXT_MESSAGE_END' first."
                    )));
                }
                self.active_messages.insert(message_id);
            }

            Event::TextMessageContent(e) => {
                self.require_message(event_type, e.message_id.as_str())?;
                e.validate()
                    .map_err(|err| ClientError::protocol(format!("Invalid 'TEXT_MESSAGE_CONTENT': {err}")))?;
            }

            Event::TextMessageEnd(e) => {
                self.require_message(event_type, e.message_id.as_str())?;
                self.active_messages.remove(e.message_id.as_str());
            }

            Event::ToolCallStart(e) => {
                let tool_call_id = e.tool_call_id.to_string();
                if self.active_tool_calls.contains(&tool_call_id) {
                    return Err(ClientError::protocol(format!(
                        "Cannot send 'TOOL_CALL_START': tool call '{tool_call_id}' is already in progress. Complete it with 'TOOL_CALL_END' first."
                    )));
                }
                if let Some(parent) = &e.parent_message_id {
                    self.require_message(event_type, parent.as_str())?;
                }
                self.active_tool_calls.insert(tool_call_id);
            }

            Event::ToolCallArgs(e) => {
                self.require_tool_call(event_type, e.tool_call_id.as_str())?;
                e.validate()
                    .map_err(|err| ClientError::protocol(format!("Invalid 'TOOL_CALL_ARGS': {err}")))?;
            }

            Event::ToolCallResult(e) => {
                self.require_tool_call(event_type, e.tool_call_id.as_str())?;
            }

            Event::ToolCallEnd(e) => {
                self.require_tool_call(event_type, e.tool_call_id.as_str())?;
                self.active_tool_calls.remove(e.tool_call_id.as_str());
            }

            Event::StepStarted(e) => {
                if let Some(name) = self.active_steps.get(&e.step_id) {
                    return Err(ClientError::protocol(format!(
                        "Step \"{name}\" ({}) is already active for 'STEP_STARTED'",
                        e.step_id
                    )));
                }
                self.active_steps.insert(e.step_id.clone(), e.step_name.clone());
            }

            Event::StepFinished(e) => {
                match self.active_steps.get(&e.step_id) {
                    None => {
                        return Err(ClientError::protocol(format!(
                            "Cannot send 'STEP_FINISHED' for step \"{}\" that was not started",
                            e.step_name
                        )));
                    }
                    Some(name) if *name != e.step_name => {
                        return Err(ClientError::protocol(format!(
                            "'STEP_FINISHED' names \"{}\" but step {} was started as \"{name}\"",
                            e.step_name, e.step_id
                        )));
                    }
                    Some(_) => {}
                }
                self.active_steps.remove(&e.step_id);
            }

            Event::ThinkingStart(_) => {
                if self.active_thinking {
                    return Err(ClientError::protocol(
                        "Cannot send 'THINKING_START': a thinking block is already in progress. End it with 'THINKING_END' first.",
                    ));
                }
                self.active_thinking = true;
            }

            Event::ThinkingEnd(_) => {
                if !self.active_thinking {
                    return Err(ClientError::protocol(
                        "Cannot send 'THINKING_END': no thinking block is in progress",
                    ));
                }
                if self.active_thinking_message {
                    return Err(ClientError::protocol(
                        "Cannot send 'THINKING_END' while a thinking message is open",
                    ));
                }
                self.active_thinking = false;
            }

            Event::ThinkingTextMessageStart(_) => {
                if !self.active_thinking {
                    return Err(ClientError::protocol(
                        "Cannot send 'THINKING_TEXT_MESSAGE_START': no thinking block is in progress. Open one with 'THINKING_START' first.",
                    ));
                }
                if self.active_thinking_message {
                    return Err(ClientError::protocol(
                        "Cannot send 'THINKING_TEXT_MESSAGE_START': a thinking message is already in progress",
                    ));
                }
                self.active_thinking_message = true;
            }

            Event::ThinkingTextMessageContent(_) | Event::ThinkingTextMessageEnd(_) => {
                if !self.active_thinking_message {
                    return Err(ClientError::protocol(format!(
                        "Cannot send '{event_type}': no thinking message is in progress"
                    )));
                }
                if event_type == EventType::ThinkingTextMessageEnd {
                    self.active_thinking_message = false;
                }
            }

            Event::TextMessageChunk(_)
            | Event::StateSnapshot(_)
            | Event::StateDelta(_)
            | Event::Custom(_)
            | Event::Raw(_) => {}
        }

        self.received += 1;
        Ok(())
    }

    fn require_message(&self, event_type: EventType, message_id: &str) -> Result<(), ClientError> {
        if self.active_messages.contains(message_id) {
            Ok(())
        } else {
            Err(ClientError::protocol(format!(
                "Cannot send '{event_type}': no active text message with ID '{message_id}'. Start one with 'TEXT_MESSAGE_START' first."
            )))
        }
    }

    fn require_tool_call(&self, event_type: EventType, tool_call_id: &str) -> Result<(), ClientError> {
        if self.active_tool_calls.contains(tool_call_id) {
            Ok(())
        } else {
            Err(ClientError::protocol(format!(
                "Cannot send '{event_type}': no active tool call with ID '{tool_call_id}'. Start one with 'TOOL_CALL_START' first."
            )))
        }
    }

    fn ensure_closed(&self) -> Result<(), ClientError> {
        if !self.active_steps.is_empty() {
            let mut steps: Vec<_> = self.active_steps.values().collect();
            steps.sort();
            return Err(ClientError::protocol(format!(
                "Cannot send 'RUN_FINISHED' while steps are still active: {steps:?}"
            )));
        }
        if !self.active_messages.is_empty() {
            let mut messages: Vec<_> = self.active_messages.iter().collect();
            messages.sort();
            return Err(ClientError::protocol(format!(
                "Cannot send 'RUN_FINISHED' while text messages are still active: {messages:?}"
            )));
        }
        if !self.active_tool_calls.is_empty() {
            let mut calls: Vec<_> = self.active_tool_calls.iter().collect();
            calls.sort();
            return Err(ClientError::protocol(format!(
                "Cannot send 'RUN_FINISHED' while tool calls are still active: {calls:?}"
            )));
        }
        if self.active_thinking {
            return Err(ClientError::protocol(
                "Cannot send 'RUN_FINISHED' while a thinking block is still active",
            ));
        }
        Ok(())
    }

    /// Wraps a stream so every event is verified before it is yielded.
    ///
    /// The first violation is yielded as an error and ends the stream. A
    /// stream that ends before its terminal event yields a final error.
    pub fn verify_stream<'a, S: AgentState + 'a>(
        self,
        stream: BoxStream<'a, Result<Event<S>, ClientError>>,
    ) -> BoxStream<'a, Result<Event<S>, ClientError>> {
        futures::stream::unfold(
            (self, stream, false),
            |(mut verifier, mut stream, failed)| async move {
                if failed {
                    return None;
                }
                match stream.next().await {
                    Some(Ok(event)) => match verifier.verify(&event) {
                        Ok(()) => Some((Ok(event), (verifier, stream, false))),
                        Err(e) => Some((Err(e), (verifier, stream, true))),
                    },
                    Some(Err(e)) => Some((Err(e), (verifier, stream, true))),
                    None if verifier.is_complete() => None,
                    None => {
                        let message = format!(
                            "stream ended after {} events without 'RUN_FINISHED' or 'RUN_ERROR'",
                            verifier.received
                        );
                        Some((Err(ClientError::protocol(message)), (verifier, stream, true)))
                    }
                }
            },
        )
        .boxed()
    }
}

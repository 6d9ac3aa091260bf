use crate::types::{MessageId, Role, RunId, StepId, ThreadId, ToolCallId};
use crate::{AgentState, JsonValue};
use serde::{Deserialize, Serialize};

/// Event types streamed during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    RunStarted,
    RunFinished,
    RunError,
    StepStarted,
    StepFinished,
    ThinkingStart,
    ThinkingEnd,
    ThinkingTextMessageStart,
    ThinkingTextMessageContent,
    ThinkingTextMessageEnd,
    TextMessageStart,
    TextMessageContent,
    TextMessageEnd,
    TextMessageChunk,
    ToolCallStart,
    ToolCallArgs,
    ToolCallResult,
    ToolCallEnd,
    StateSnapshot,
    StateDelta,
    Custom,
    Raw,
}

impl EventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventType::RunStarted => "RUN_STARTED",
            EventType::RunFinished => "RUN_FINISHED",
            EventType::RunError => "RUN_ERROR",
            EventType::StepStarted => "STEP_STARTED",
            EventType::StepFinished => "STEP_FINISHED",
            EventType::ThinkingStart => "THINKING_START",
            EventType::ThinkingEnd => "THINKING_END",
            EventType::ThinkingTextMessageStart => "THINKING_TEXT_MESSAGE_START",
            EventType::ThinkingTextMessageContent => "THINKING_TEXT_MESSAGE_CONTENT",
            EventType::ThinkingTextMessageEnd => "THINKING_TEXT_MESSAGE_END",
            EventType::TextMessageStart => "TEXT_MESSAGE_START",
            EventType::TextMessageContent => "TEXT_MESSAGE_CONTENT",
            EventType::TextMessageEnd => "TEXT_MESSAGE_END",
            EventType::TextMessageChunk => "TEXT_MESSAGE_CHUNK",
            EventType::ToolCallStart => "TOOL_CALL_START",
            EventType::ToolCallArgs => "TOOL_CALL_ARGS",
            EventType::ToolCallResult => "TOOL_CALL_RESULT",
            EventType::ToolCallEnd => "TOOL_CALL_END",
            EventType::StateSnapshot => "STATE_SNAPSHOT",
            EventType::StateDelta => "STATE_DELTA",
            EventType::Custom => "CUSTOM",
            EventType::Raw => "RAW",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base event fields common to all events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseEvent {
    /// Milliseconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(rename = "rawEvent", skip_serializing_if = "Option::is_none")]
    pub raw_event: Option<JsonValue>,
}

impl BaseEvent {
    /// Base stamped with the current wall-clock time.
    pub fn now() -> Self {
        Self {
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
            raw_event: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStartedEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "threadId")]
    pub thread_id: ThreadId,
    #[serde(rename = "runId")]
    pub run_id: RunId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFinishedEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "threadId")]
    pub thread_id: ThreadId,
    #[serde(rename = "runId")]
    pub run_id: RunId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunErrorEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,
    #[serde(rename = "runId", skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepStartedEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "stepId")]
    pub step_id: StepId,
    #[serde(rename = "stepName")]
    pub step_name: String,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,
    #[serde(rename = "runId", skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFinishedEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "stepId")]
    pub step_id: StepId,
    #[serde(rename = "stepName")]
    pub step_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingStartEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingEndEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingTextMessageStartEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingTextMessageContentEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub delta: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingTextMessageEndEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessageStartEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "messageId")]
    pub message_id: MessageId,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessageContentEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "messageId")]
    pub message_id: MessageId,
    pub delta: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessageEndEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "messageId")]
    pub message_id: MessageId,
}

/// Text message chunk event (optional fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessageChunkEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallStartEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "toolCallId")]
    pub tool_call_id: ToolCallId,
    #[serde(rename = "toolCallName")]
    pub tool_call_name: String,
    #[serde(rename = "parentMessageId", skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallArgsEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "toolCallId")]
    pub tool_call_id: ToolCallId,
    pub delta: String,
}

/// Tool call result event. `result` is the tool's structured output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResultEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "toolCallId")]
    pub tool_call_id: ToolCallId,
    pub result: JsonValue,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallEndEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    #[serde(rename = "toolCallId")]
    pub tool_call_id: ToolCallId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshotEvent<S = JsonValue> {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub state: S,
}

/// State delta event (JSON Patch RFC 6902)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDeltaEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub delta: Vec<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub name: String,
    pub value: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(flatten)]
    pub base: BaseEvent,
    pub event: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Union of all events a run can emit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event<S = JsonValue> {
    RunStarted(RunStartedEvent),
    RunFinished(RunFinishedEvent),
    RunError(RunErrorEvent),
    StepStarted(StepStartedEvent),
    StepFinished(StepFinishedEvent),
    ThinkingStart(ThinkingStartEvent),
    ThinkingEnd(ThinkingEndEvent),
    ThinkingTextMessageStart(ThinkingTextMessageStartEvent),
    ThinkingTextMessageContent(ThinkingTextMessageContentEvent),
    ThinkingTextMessageEnd(ThinkingTextMessageEndEvent),
    TextMessageStart(TextMessageStartEvent),
    TextMessageContent(TextMessageContentEvent),
    TextMessageEnd(TextMessageEndEvent),
    TextMessageChunk(TextMessageChunkEvent),
    ToolCallStart(ToolCallStartEvent),
    ToolCallArgs(ToolCallArgsEvent),
    ToolCallResult(ToolCallResultEvent),
    ToolCallEnd(ToolCallEndEvent),
    StateSnapshot(StateSnapshotEvent<S>),
    StateDelta(StateDeltaEvent),
    Custom(CustomEvent),
    Raw(RawEvent),
}

impl<S> Event<S> {
    /// Get the event type
    pub fn event_type(&self) -> EventType {
        match self {
            Event::RunStarted(_) => EventType::RunStarted,
            Event::RunFinished(_) => EventType::RunFinished,
            Event::RunError(_) => EventType::RunError,
            Event::StepStarted(_) => EventType::StepStarted,
            Event::StepFinished(_) => EventType::StepFinished,
            Event::ThinkingStart(_) => EventType::ThinkingStart,
            Event::ThinkingEnd(_) => EventType::ThinkingEnd,
            Event::ThinkingTextMessageStart(_) => EventType::ThinkingTextMessageStart,
            Event::ThinkingTextMessageContent(_) => EventType::ThinkingTextMessageContent,
            Event::ThinkingTextMessageEnd(_) => EventType::ThinkingTextMessageEnd,
            Event::TextMessageStart(_) => EventType::TextMessageStart,
            Event::TextMessageContent(_) => EventType::TextMessageContent,
            Event::TextMessageEnd(_) => EventType::TextMessageEnd,
            Event::TextMessageChunk(_) => EventType::TextMessageChunk,
            Event::ToolCallStart(_) => EventType::ToolCallStart,
            Event::ToolCallArgs(_) => EventType::ToolCallArgs,
            Event::ToolCallResult(_) => EventType::ToolCallResult,
            Event::ToolCallEnd(_) => EventType::ToolCallEnd,
            Event::StateSnapshot(_) => EventType::StateSnapshot,
            Event::StateDelta(_) => EventType::StateDelta,
            Event::Custom(_) => EventType::Custom,
            Event::Raw(_) => EventType::Raw,
        }
    }

    fn base(&self) -> &BaseEvent {
        match self {
            Event::RunStarted(e) => &e.base,
            Event::RunFinished(e) => &e.base,
            Event::RunError(e) => &e.base,
            Event::StepStarted(e) => &e.base,
            Event::StepFinished(e) => &e.base,
            Event::ThinkingStart(e) => &e.base,
            Event::ThinkingEnd(e) => &e.base,
            Event::ThinkingTextMessageStart(e) => &e.base,
            Event::ThinkingTextMessageContent(e) => &e.base,
            Event::ThinkingTextMessageEnd(e) => &e.base,
            Event::TextMessageStart(e) => &e.base,
            Event::TextMessageContent(e) => &e.base,
            Event::TextMessageEnd(e) => &e.base,
            Event::TextMessageChunk(e) => &e.base,
            Event::ToolCallStart(e) => &e.base,
            Event::ToolCallArgs(e) => &e.base,
            Event::ToolCallResult(e) => &e.base,
            Event::ToolCallEnd(e) => &e.base,
            Event::StateSnapshot(e) => &e.base,
            Event::StateDelta(e) => &e.base,
            Event::Custom(e) => &e.base,
            Event::Raw(e) => &e.base,
        }
    }

    /// Get the timestamp if available
    pub fn timestamp(&self) -> Option<i64> {
        self.base().timestamp
    }

    /// `RUN_FINISHED` and `RUN_ERROR` end a run; nothing may follow them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::RunFinished(_) | Event::RunError(_))
    }
}

/// Validation error for events
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventValidationError {
    #[error("Delta must not be an empty string")]
    EmptyDelta,
    #[error("Invalid event format: {0}")]
    InvalidFormat(String),
}

impl TextMessageContentEvent {
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.delta.is_empty() {
            return Err(EventValidationError::EmptyDelta);
        }
        Ok(())
    }
}

impl ToolCallArgsEvent {
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.delta.is_empty() {
            return Err(EventValidationError::EmptyDelta);
        }
        Ok(())
    }
}

/// Constructors stamping the current time. Used by the relay and in tests.
impl<S: AgentState> Event<S> {
    pub fn run_started(thread_id: ThreadId, run_id: RunId) -> Self {
        Event::RunStarted(RunStartedEvent {
            base: BaseEvent::now(),
            thread_id,
            run_id,
        })
    }

    pub fn run_finished(thread_id: ThreadId, run_id: RunId, result: Option<JsonValue>) -> Self {
        Event::RunFinished(RunFinishedEvent {
            base: BaseEvent::now(),
            thread_id,
            run_id,
            result,
        })
    }

    pub fn run_error(message: impl Into<String>, code: Option<String>) -> Self {
        Event::RunError(RunErrorEvent {
            base: BaseEvent::now(),
            message: message.into(),
            code,
            thread_id: None,
            run_id: None,
        })
    }

    pub fn text_message_start(message_id: MessageId) -> Self {
        Event::TextMessageStart(TextMessageStartEvent {
            base: BaseEvent::now(),
            message_id,
            role: Role::Assistant,
        })
    }

    pub fn text_message_content(
        message_id: MessageId,
        delta: impl Into<String>,
    ) -> Result<Self, EventValidationError> {
        let event = TextMessageContentEvent {
            base: BaseEvent::now(),
            message_id,
            delta: delta.into(),
        };
        event.validate()?;
        Ok(Event::TextMessageContent(event))
    }

    pub fn text_message_end(message_id: MessageId) -> Self {
        Event::TextMessageEnd(TextMessageEndEvent {
            base: BaseEvent::now(),
            message_id,
        })
    }

    pub fn custom(name: impl Into<String>, value: JsonValue) -> Self {
        Event::Custom(CustomEvent {
            base: BaseEvent::now(),
            name: name.into(),
            value,
        })
    }

    pub fn state_snapshot(state: S) -> Self {
        Event::StateSnapshot(StateSnapshotEvent {
            base: BaseEvent::now(),
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tag_is_screaming_snake_case() {
        let event: Event = Event::run_started(ThreadId::new("t1"), RunId::new("r1"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "RUN_STARTED");
        assert_eq!(json["threadId"], "t1");
        assert_eq!(json["runId"], "r1");
        assert!(json["timestamp"].is_i64());
        assert!(json.get("rawEvent").is_none());
    }

    #[test]
    fn tool_call_result_carries_structured_result() {
        let raw = json!({
            "type": "TOOL_CALL_RESULT",
            "toolCallId": "call_1",
            "result": {"totalResults": 6}
        });
        let event: Event = serde_json::from_value(raw).unwrap();
        match event {
            Event::ToolCallResult(e) => {
                assert_eq!(e.tool_call_id, "call_1");
                assert_eq!(e.result["totalResults"], 6);
                assert!(e.base.timestamp.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn state_snapshot_uses_state_field() {
        let event: Event = Event::state_snapshot(json!({"currentStep": "complete"}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "STATE_SNAPSHOT");
        assert_eq!(json["state"]["currentStep"], "complete");
    }

    #[test]
    fn empty_content_delta_is_rejected() {
        let err = Event::<JsonValue>::text_message_content(MessageId::new("m"), "").unwrap_err();
        assert_eq!(err, EventValidationError::EmptyDelta);
    }

    #[test]
    fn terminal_events() {
        let finished: Event = Event::run_finished(ThreadId::new("t"), RunId::new("r"), None);
        let error: Event = Event::run_error("boom", Some("AGENT_ERROR".into()));
        let custom: Event = Event::custom("X", json!(null));
        assert!(finished.is_terminal());
        assert!(error.is_terminal());
        assert!(!custom.is_terminal());
        assert_eq!(error.event_type().to_string(), "RUN_ERROR");
    }

    #[test]
    fn run_error_omits_missing_code() {
        let event: Event = Event::run_error("boom", None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["message"], "boom");
        assert!(json.get("code").is_none());
    }
}

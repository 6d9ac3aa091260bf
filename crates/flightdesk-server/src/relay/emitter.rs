//! Ordered event emission for one run.

use crate::agent::{AgentContext, ToolInvocation};
use crate::config::Pacing;
use crate::error::{AgentError, AgentResult, TransportError};
use flightdesk_core::event::{
    BaseEvent, Event, EventType, RunErrorEvent, StepFinishedEvent, StepStartedEvent,
    TextMessageContentEvent, ThinkingEndEvent, ThinkingStartEvent, ThinkingTextMessageContentEvent,
    ThinkingTextMessageEndEvent, ThinkingTextMessageStartEvent, ToolCallArgsEvent,
    ToolCallEndEvent, ToolCallResultEvent, ToolCallStartEvent,
};
use flightdesk_core::types::{MessageId, RunId, StepId, ThreadId};
use flightdesk_core::JsonValue;
use std::time::Duration;
use tokio::sync::mpsc;

/// Maximum characters per `TEXT_MESSAGE_CONTENT` delta.
pub const CONTENT_CHUNK_CHARS: usize = 15;

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Nothing sent yet.
    Idle,
    /// `RUN_STARTED` sent, no message open.
    Running,
    /// Inside an assistant message.
    StreamingText,
    /// Inside a tool call of the open message.
    CallingTool,
}

/// Splits `text` into pieces of at most `max` characters.
#[must_use]
pub fn chunk_text(text: &str, max: usize) -> Vec<&str> {
    let max = max.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    for (count, (index, _)) in text.char_indices().enumerate() {
        if count > 0 && count % max == 0 {
            chunks.push(&text[start..index]);
            start = index;
        }
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Writes the events of one run into the response channel, refusing any
/// emission that would break lifecycle ordering.
///
/// The two terminal operations, [`finish`](Self::finish) and
/// [`fail`](Self::fail), consume the emitter; dropping it closes the
/// channel and with it the HTTP body.
#[derive(Debug)]
pub struct EventEmitter {
    tx: mpsc::Sender<Event>,
    ctx: AgentContext,
    pacing: Pacing,
    thread_id: ThreadId,
    run_id: RunId,
    error_code: &'static str,
    phase: RunPhase,
    message: Option<MessageId>,
    step: Option<(StepId, String)>,
    sent: usize,
}

impl EventEmitter {
    /// Emitter for run `run_id` of `thread_id`; `RUN_ERROR` events carry
    /// `error_code`.
    #[must_use]
    pub fn new(
        tx: mpsc::Sender<Event>,
        ctx: AgentContext,
        pacing: Pacing,
        thread_id: ThreadId,
        run_id: RunId,
        error_code: &'static str,
    ) -> Self {
        Self {
            tx,
            ctx,
            pacing,
            thread_id,
            run_id,
            error_code,
            phase: RunPhase::Idle,
            message: None,
            step: None,
            sent: 0,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Events written so far.
    #[must_use]
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// The run's context.
    #[must_use]
    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    /// The open message, if any.
    #[must_use]
    pub fn message_id(&self) -> Option<&MessageId> {
        self.message.as_ref()
    }

    fn expect(&self, event_type: EventType, allowed: &[RunPhase]) -> AgentResult<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(AgentError::ProtocolViolation {
                event_type: event_type.as_str(),
                violation: format!("not allowed while {:?}", self.phase),
            })
        }
    }

    fn open_message(&self, event_type: EventType) -> AgentResult<MessageId> {
        self.expect(event_type, &[RunPhase::StreamingText])?;
        self.message.clone().ok_or_else(|| AgentError::ProtocolViolation {
            event_type: event_type.as_str(),
            violation: "no open message".into(),
        })
    }

    async fn send(&mut self, event: Event) -> AgentResult<()> {
        if self.tx.send(event).await.is_err() {
            self.ctx.cancel();
            return Err(AgentError::Transport(TransportError::ClientDisconnected {
                reason: "event stream receiver dropped".into(),
            }));
        }
        self.sent += 1;
        Ok(())
    }

    /// Waits `delay` unless the run is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Aborted`] on cancellation.
    pub async fn pause(&self, delay: Duration) -> AgentResult<()> {
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            () = self.ctx.cancelled() => Err(AgentError::Aborted {
                reason: "client disconnected".into(),
            }),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// `RUN_STARTED`.
    ///
    /// # Errors
    ///
    /// Fails if the run was already started or the client is gone.
    pub async fn start(&mut self) -> AgentResult<()> {
        self.expect(EventType::RunStarted, &[RunPhase::Idle])?;
        self.send(Event::run_started(self.thread_id.clone(), self.run_id.clone()))
            .await?;
        self.phase = RunPhase::Running;
        Ok(())
    }

    /// A complete thinking block carrying `text`.
    ///
    /// # Errors
    ///
    /// Fails outside [`RunPhase::Running`] or if the client is gone.
    pub async fn thinking(&mut self, title: &str, text: &str) -> AgentResult<()> {
        self.expect(EventType::ThinkingStart, &[RunPhase::Running])?;
        self.send(Event::ThinkingStart(ThinkingStartEvent {
            base: BaseEvent::now(),
            message_id: Some(MessageId::random()),
            title: Some(title.to_string()),
        }))
        .await?;
        self.send(Event::ThinkingTextMessageStart(ThinkingTextMessageStartEvent {
            base: BaseEvent::now(),
        }))
        .await?;
        if !text.is_empty() {
            self.send(Event::ThinkingTextMessageContent(ThinkingTextMessageContentEvent {
                base: BaseEvent::now(),
                delta: text.to_string(),
            }))
            .await?;
        }
        self.send(Event::ThinkingTextMessageEnd(ThinkingTextMessageEndEvent {
            base: BaseEvent::now(),
        }))
        .await?;
        self.pause(self.pacing.thinking).await?;
        self.send(Event::ThinkingEnd(ThinkingEndEvent {
            base: BaseEvent::now(),
        }))
        .await
    }

    /// `STEP_STARTED`. Steps do not nest.
    ///
    /// # Errors
    ///
    /// Fails if a step is open, the run is not started, or the client is gone.
    pub async fn start_step(&mut self, id: &str, name: &str) -> AgentResult<()> {
        self.expect(
            EventType::StepStarted,
            &[RunPhase::Running, RunPhase::StreamingText],
        )?;
        if let Some((open, _)) = &self.step {
            return Err(AgentError::ProtocolViolation {
                event_type: EventType::StepStarted.as_str(),
                violation: format!("step '{open}' is still open"),
            });
        }
        let step_id = StepId::new(id);
        self.send(Event::StepStarted(StepStartedEvent {
            base: BaseEvent::now(),
            step_id: step_id.clone(),
            step_name: name.to_string(),
            thread_id: Some(self.thread_id.clone()),
            run_id: Some(self.run_id.clone()),
        }))
        .await?;
        self.step = Some((step_id, name.to_string()));
        Ok(())
    }

    /// `STEP_FINISHED` for the open step.
    ///
    /// # Errors
    ///
    /// Fails if no step is open or the client is gone.
    pub async fn finish_step(&mut self, result: Option<JsonValue>) -> AgentResult<()> {
        let Some((step_id, step_name)) = self.step.take() else {
            return Err(AgentError::ProtocolViolation {
                event_type: EventType::StepFinished.as_str(),
                violation: "no open step".into(),
            });
        };
        self.send(Event::StepFinished(StepFinishedEvent {
            base: BaseEvent::now(),
            step_id,
            step_name,
            result,
        }))
        .await
    }

    /// `TEXT_MESSAGE_START` for a new assistant message.
    ///
    /// # Errors
    ///
    /// Fails if a message is already open or the client is gone.
    pub async fn start_message(&mut self) -> AgentResult<MessageId> {
        self.expect(EventType::TextMessageStart, &[RunPhase::Running])?;
        let message_id = MessageId::random();
        self.send(Event::text_message_start(message_id.clone())).await?;
        self.message = Some(message_id.clone());
        self.phase = RunPhase::StreamingText;
        Ok(message_id)
    }

    /// One `TEXT_MESSAGE_CONTENT` carrying `delta` verbatim. Empty deltas are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Fails outside an open message or if the client is gone.
    pub async fn delta(&mut self, delta: &str) -> AgentResult<()> {
        let message_id = self.open_message(EventType::TextMessageContent)?;
        if delta.is_empty() {
            return Ok(());
        }
        self.send(Event::TextMessageContent(TextMessageContentEvent {
            base: BaseEvent::now(),
            message_id,
            delta: delta.to_string(),
        }))
        .await
    }

    /// `text` as paced content chunks of [`CONTENT_CHUNK_CHARS`].
    ///
    /// # Errors
    ///
    /// Fails outside an open message, on cancellation, or if the client is gone.
    pub async fn content(&mut self, text: &str) -> AgentResult<()> {
        self.open_message(EventType::TextMessageContent)?;
        for chunk in chunk_text(text, CONTENT_CHUNK_CHARS) {
            self.delta(chunk).await?;
            self.pause(self.pacing.text_chunk).await?;
        }
        Ok(())
    }

    /// Replays one executed tool call: start, args, result, end.
    ///
    /// # Errors
    ///
    /// Fails outside an open message, on cancellation, or if the client is gone.
    pub async fn tool_call(&mut self, call: &ToolInvocation) -> AgentResult<JsonValue> {
        let parent = self.open_message(EventType::ToolCallStart)?;
        let args = serde_json::to_string_pretty(&call.args)
            .map_err(|e| AgentError::custom_with_source("failed to encode tool arguments", e))?;
        let result = serde_json::to_value(&call.output)
            .map_err(|e| AgentError::custom_with_source("failed to encode tool result", e))?;

        self.phase = RunPhase::CallingTool;
        self.send(Event::ToolCallStart(ToolCallStartEvent {
            base: BaseEvent::now(),
            tool_call_id: call.id.clone(),
            tool_call_name: call.kind.id().to_string(),
            parent_message_id: Some(parent.clone()),
        }))
        .await?;
        self.pause(self.pacing.tool_start).await?;

        self.send(Event::ToolCallArgs(ToolCallArgsEvent {
            base: BaseEvent::now(),
            tool_call_id: call.id.clone(),
            delta: args,
        }))
        .await?;
        self.pause(self.pacing.tool_args).await?;

        self.send(Event::ToolCallResult(ToolCallResultEvent {
            base: BaseEvent::now(),
            tool_call_id: call.id.clone(),
            result: result.clone(),
            message_id: Some(parent),
        }))
        .await?;
        self.pause(self.pacing.tool_result).await?;

        self.send(Event::ToolCallEnd(ToolCallEndEvent {
            base: BaseEvent::now(),
            tool_call_id: call.id.clone(),
        }))
        .await?;
        self.phase = RunPhase::StreamingText;
        Ok(result)
    }

    /// `CUSTOM` event.
    ///
    /// # Errors
    ///
    /// Fails before the run starts or if the client is gone.
    pub async fn custom(&mut self, name: &str, value: JsonValue) -> AgentResult<()> {
        self.expect(EventType::Custom, &[RunPhase::Running, RunPhase::StreamingText])?;
        self.send(Event::custom(name, value)).await
    }

    /// `STATE_SNAPSHOT`.
    ///
    /// # Errors
    ///
    /// Fails before the run starts or if the client is gone.
    pub async fn state_snapshot(&mut self, state: JsonValue) -> AgentResult<()> {
        self.expect(
            EventType::StateSnapshot,
            &[RunPhase::Running, RunPhase::StreamingText],
        )?;
        self.send(Event::state_snapshot(state)).await
    }

    /// `TEXT_MESSAGE_END` for the open message.
    ///
    /// # Errors
    ///
    /// Fails if no message is open or the client is gone.
    pub async fn end_message(&mut self) -> AgentResult<()> {
        let message_id = self.open_message(EventType::TextMessageEnd)?;
        self.send(Event::text_message_end(message_id)).await?;
        self.message = None;
        self.phase = RunPhase::Running;
        Ok(())
    }

    /// `RUN_FINISHED`. The message and step must be closed; if they are
    /// not, `RUN_ERROR` is sent instead and the violation returned. Before
    /// `RUN_STARTED` nothing is sent.
    ///
    /// # Errors
    ///
    /// Fails on an out-of-order finish or if the client is gone.
    pub async fn finish(mut self, result: Option<JsonValue>) -> AgentResult<()> {
        let ready = self.expect(EventType::RunFinished, &[RunPhase::Running]).and_then(|()| {
            match &self.step {
                Some((open, _)) => Err(AgentError::ProtocolViolation {
                    event_type: EventType::RunFinished.as_str(),
                    violation: format!("step '{open}' is still open"),
                }),
                None => Ok(()),
            }
        });
        if let Err(violation) = ready {
            if self.phase != RunPhase::Idle {
                self.fail(&violation).await?;
            }
            return Err(violation);
        }
        let event = Event::run_finished(self.thread_id.clone(), self.run_id.clone(), result);
        self.send(event).await
    }

    /// `RUN_ERROR` carrying `err`. Allowed in any phase.
    ///
    /// # Errors
    ///
    /// Fails only if the client is gone.
    pub async fn fail(mut self, err: &AgentError) -> AgentResult<()> {
        let event = Event::RunError(RunErrorEvent {
            base: BaseEvent::now(),
            message: err.to_string(),
            code: Some(self.error_code.to_string()),
            thread_id: Some(self.thread_id.clone()),
            run_id: Some(self.run_id.clone()),
        });
        self.send(event).await
    }
}

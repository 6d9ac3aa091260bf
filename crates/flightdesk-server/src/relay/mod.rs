//! Turns one agent run into an ordered stream of [`Event`]s.
//!
//! [`Relay::start`] spawns the run on the runtime and hands back the
//! receiving half of a bounded channel; the HTTP layer encodes whatever
//! arrives on it. Every run writes `RUN_STARTED` first and ends with exactly
//! one of `RUN_FINISHED` or `RUN_ERROR`.
//!
//! A flight search produces:
//!
//! ```text
//! RUN_STARTED
//!   THINKING_START .. THINKING_END
//!   STEP_STARTED
//!   TEXT_MESSAGE_START
//!     TOOL_CALL_START TOOL_CALL_ARGS TOOL_CALL_RESULT TOOL_CALL_END CUSTOM   (per call)
//!     TEXT_MESSAGE_CONTENT*
//!     STATE_SNAPSHOT
//!   TEXT_MESSAGE_END
//!   STEP_FINISHED
//! RUN_FINISHED
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use flightdesk_server::agent::{AgentContext, ScriptedAgent};
//! use flightdesk_server::config::Pacing;
//! use flightdesk_server::relay::{Relay, RunInput, RunRequest};
//! use flightdesk_server::tools::ToolRegistry;
//! use std::sync::Arc;
//! use tokio_stream::StreamExt;
//!
//! # async fn run() {
//! let agent = ScriptedAgent::new(Arc::new(ToolRegistry::offline()));
//! let relay = Relay::new(Arc::new(agent), Pacing::none());
//! let request = RunRequest::new("thread-1", "run-1", RunInput::Chat("hello".into()));
//!
//! let events: Vec<_> = relay.start(request, AgentContext::empty()).collect().await;
//! assert!(events.last().is_some_and(|e| e.is_terminal()));
//! # }
//! ```

mod emitter;

pub use emitter::{chunk_text, EventEmitter, RunPhase, CONTENT_CHUNK_CHARS};

use crate::agent::{Agent, AgentContext, GenerateOptions, Generation, ToolChoice};
use crate::config::Pacing;
use crate::error::{AgentError, AgentResult};
use crate::search::simulate_latency;
use crate::state::{RunState, RunStep, StateManager};
use crate::workflow::{self, WorkflowOutput, WorkflowStep};
use flightdesk_core::event::{Event, EventType};
use flightdesk_core::flight::SearchParams;
use flightdesk_core::types::{ChatMessage, RunId, ThreadId};
use flightdesk_core::JsonValue;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

/// Channel capacity between a run and its HTTP body.
pub const DEFAULT_BUFFER: usize = 64;

/// Custom event carrying a flight tool's result.
pub const FLIGHT_SEARCH_RESULT: &str = "FLIGHT_SEARCH_RESULT";

/// Custom event carrying the workflow's output.
pub const WORKFLOW_RESULT: &str = "WORKFLOW_RESULT";

const ANALYSIS_STEP_ID: &str = "analysis-step";
const ANALYSIS_STEP_NAME: &str = "Request Analysis";

/// The three kinds of streamed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// `/api/agents/flight-search`
    FlightSearch,
    /// `/api/agents/chat`
    Chat,
    /// `/api/agents/workflow`
    Workflow,
}

impl RunKind {
    /// `code` of this kind's `RUN_ERROR`.
    #[must_use]
    pub const fn error_code(self) -> &'static str {
        match self {
            RunKind::FlightSearch => "AGENT_ERROR",
            RunKind::Chat => "CHAT_ERROR",
            RunKind::Workflow => "WORKFLOW_ERROR",
        }
    }

    /// Name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunKind::FlightSearch => "flight-search",
            RunKind::Chat => "chat",
            RunKind::Workflow => "workflow",
        }
    }
}

/// What a run was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum RunInput {
    /// Structured search; a tool call is mandatory.
    Search {
        /// The search to run.
        params: SearchParams,
        /// Free text sent along with the form, if any.
        message: Option<String>,
    },
    /// Free-text flight request; the agent decides whether to call a tool.
    Ask(String),
    /// Conversation; tool calls the agent makes are replayed as for a search.
    Chat(String),
    /// A named workflow.
    Workflow {
        /// Workflow id.
        workflow_id: String,
        /// Raw `inputData`.
        input_data: JsonValue,
    },
}

impl RunInput {
    /// The kind of run this input starts.
    #[must_use]
    pub fn kind(&self) -> RunKind {
        match self {
            RunInput::Search { .. } | RunInput::Ask(_) => RunKind::FlightSearch,
            RunInput::Chat(_) => RunKind::Chat,
            RunInput::Workflow { .. } => RunKind::Workflow,
        }
    }
}

/// A validated request for one streamed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    /// Conversation thread.
    pub thread_id: ThreadId,
    /// This run.
    pub run_id: RunId,
    /// What to do.
    pub input: RunInput,
}

impl RunRequest {
    /// Request for `input` on `thread_id` / `run_id`.
    pub fn new(thread_id: impl Into<ThreadId>, run_id: impl Into<RunId>, input: RunInput) -> Self {
        Self {
            thread_id: thread_id.into(),
            run_id: run_id.into(),
            input,
        }
    }
}

/// Prompt asking the agent to search with exactly `params`.
///
/// # Errors
///
/// Fails only if the parameters cannot be encoded.
pub fn search_prompt(params: &SearchParams, message: Option<&str>) -> AgentResult<String> {
    let encoded = serde_json::to_string_pretty(params)
        .map_err(|e| AgentError::custom_with_source("failed to encode search parameters", e))?;
    let mut prompt = String::new();
    if let Some(message) = message.map(str::trim).filter(|m| !m.is_empty()) {
        prompt.push_str(message);
        prompt.push_str("\n\n");
    }
    prompt.push_str(
        "I need you to search for flights using one of your available flight search tools with these exact parameters: ",
    );
    prompt.push_str(&encoded);
    prompt.push_str(
        "\n\nPlease call one of your flight search tools now with these parameters to find available flight options.",
    );
    Ok(prompt)
}

/// Runs agent requests and streams their events.
///
/// Cloning is cheap; the agent is shared.
#[derive(Clone)]
pub struct Relay {
    agent: Arc<dyn Agent>,
    pacing: Pacing,
    buffer: usize,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("agent", &self.agent.name())
            .field("pacing", &self.pacing)
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl Relay {
    /// Relay driving `agent` with the given pacing.
    #[must_use]
    pub fn new(agent: Arc<dyn Agent>, pacing: Pacing) -> Self {
        Self {
            agent,
            pacing,
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Set the channel capacity. Zero is treated as one.
    #[must_use]
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// The agent runs are sent to.
    #[must_use]
    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    /// Spawns the run and returns its event stream.
    ///
    /// Dropping the stream cancels `ctx`, which stops the run at its next
    /// await point.
    #[must_use]
    pub fn start(&self, request: RunRequest, ctx: AgentContext) -> ReceiverStream<Event> {
        let (tx, rx) = mpsc::channel(self.buffer);
        let relay = self.clone();
        let span = ctx.span().clone();
        tokio::spawn(async move { relay.run(request, ctx, tx).await }.instrument(span));
        ReceiverStream::new(rx)
    }

    /// Runs `request` to completion, writing events into `tx`.
    pub async fn run(&self, request: RunRequest, ctx: AgentContext, tx: mpsc::Sender<Event>) {
        let kind = request.input.kind();
        tracing::info!(
            kind = kind.as_str(),
            thread_id = %request.thread_id,
            run_id = %request.run_id,
            agent = self.agent.name(),
            "run started"
        );

        let watcher = tx.clone();
        let mut emitter = EventEmitter::new(
            tx,
            ctx.clone(),
            self.pacing,
            request.thread_id,
            request.run_id,
            kind.error_code(),
        );

        let outcome = tokio::select! {
            biased;
            outcome = self.drive(&mut emitter, request.input) => outcome,
            () = watcher.closed() => {
                ctx.cancel();
                Err(AgentError::Aborted { reason: "client disconnected".into() })
            }
        };
        drop(watcher);

        let sent = emitter.sent();
        match outcome {
            Ok(result) => match emitter.finish(Some(result)).await {
                Ok(()) => tracing::info!(kind = kind.as_str(), events = sent + 1, "run finished"),
                Err(e) => tracing::warn!(kind = kind.as_str(), error = %e, "run could not finish"),
            },
            Err(e) if e.is_cancelled() || ctx.is_cancelled() => {
                tracing::info!(kind = kind.as_str(), events = sent, reason = %e, "run cancelled");
            }
            Err(e) => {
                tracing::warn!(
                    kind = kind.as_str(),
                    code = kind.error_code(),
                    error = %e,
                    "run failed"
                );
                if let Err(send_err) = emitter.fail(&e).await {
                    tracing::debug!(error = %send_err, "RUN_ERROR not delivered");
                }
            }
        }
    }

    async fn drive(&self, emitter: &mut EventEmitter, input: RunInput) -> AgentResult<JsonValue> {
        emitter.start().await?;
        match input {
            RunInput::Search { params, message } => {
                let prompt = search_prompt(&params, message.as_deref())?;
                self.flight_search(emitter, prompt, ToolChoice::Required).await
            }
            RunInput::Ask(message) => self.flight_search(emitter, message, ToolChoice::Auto).await,
            RunInput::Chat(message) => self.chat(emitter, message).await,
            RunInput::Workflow {
                workflow_id,
                input_data,
            } => self.workflow(emitter, &workflow_id, &input_data).await,
        }
    }

    async fn flight_search(
        &self,
        emitter: &mut EventEmitter,
        prompt: String,
        tool_choice: ToolChoice,
    ) -> AgentResult<JsonValue> {
        let ctx = emitter.context().clone();
        let state = StateManager::new(RunState::default());

        track(&state, |s| s.current_step = RunStep::Thinking)?;
        emitter
            .thinking(
                "Analyzing request",
                "Analyzing your flight request and choosing a search tool...",
            )
            .await?;
        emitter.start_step(ANALYSIS_STEP_ID, ANALYSIS_STEP_NAME).await?;
        emitter.start_message().await?;
        track(&state, |s| {
            s.message_count += 1;
            s.current_step = RunStep::Generating;
        })?;

        let messages = [ChatMessage::user(prompt)];
        let generation = self.generate(&messages, tool_choice, &ctx).await?;

        if tool_choice == ToolChoice::Required && !generation.has_tool_calls() {
            return Err(AgentError::ProtocolViolation {
                event_type: EventType::ToolCallStart.as_str(),
                violation: format!(
                    "agent '{}' made no tool call although one was required",
                    self.agent.name()
                ),
            });
        }

        track(&state, |s| s.current_step = RunStep::Streaming)?;
        replay_tool_calls(emitter, &generation).await?;
        track(&state, |s| {
            for call in &generation.tool_calls {
                s.record_tool(call.kind.id());
            }
        })?;

        emitter.content(&generation.text).await?;

        track(&state, |s| s.current_step = RunStep::Completed)?;
        let snapshot = serde_json::to_value(state.snapshot())
            .map_err(|e| AgentError::custom_with_source("failed to encode run state", e))?;
        emitter.state_snapshot(snapshot).await?;
        emitter.end_message().await?;
        emitter.finish_step(Some(json!({ "status": "completed" }))).await?;

        Ok(json!({
            "success": true,
            "toolCallCount": generation.tool_calls.len(),
        }))
    }

    async fn chat(&self, emitter: &mut EventEmitter, message: String) -> AgentResult<JsonValue> {
        let ctx = emitter.context().clone();
        emitter.start_message().await?;

        let messages = [ChatMessage::user(message)];
        let generation = self.generate(&messages, ToolChoice::Auto, &ctx).await?;
        replay_tool_calls(emitter, &generation).await?;
        emitter.content(&generation.text).await?;
        emitter.end_message().await?;

        Ok(json!({
            "success": true,
            "toolCallCount": generation.tool_calls.len(),
        }))
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        tool_choice: ToolChoice,
        ctx: &AgentContext,
    ) -> AgentResult<Generation> {
        let options = GenerateOptions::new(tool_choice);
        tokio::select! {
            biased;
            () = ctx.cancelled() => Err(AgentError::Aborted { reason: "client disconnected".into() }),
            generation = self.agent.generate(messages, &options, ctx) => generation,
        }
    }

    async fn workflow(
        &self,
        emitter: &mut EventEmitter,
        workflow_id: &str,
        input_data: &JsonValue,
    ) -> AgentResult<JsonValue> {
        let workflow_id = workflow::lookup(workflow_id)?;
        let params = workflow::decode_input(input_data)?;

        emitter.start_message().await?;
        emitter
            .delta(&format!("🔄 Executing workflow: {workflow_id}...\n\n"))
            .await?;

        let mut validated = None;
        let mut outcome = None;
        let mut formatted = None;
        for step in WorkflowStep::ALL {
            emitter.start_step(step.id(), step.description()).await?;
            let output = match step {
                WorkflowStep::ValidateSearch => {
                    let result = workflow::validate_search(&params);
                    let output = step_output(&result)?;
                    validated = Some(result);
                    output
                }
                WorkflowStep::SearchFlights => {
                    let input = validated.as_ref().ok_or_else(|| missing_step(step))?;
                    simulate_latency(&self.pacing).await;
                    let result = workflow::search_flights(input, &mut StdRng::from_entropy());
                    let output = step_output(&result)?;
                    outcome = Some(result);
                    output
                }
                WorkflowStep::FormatResults => {
                    let input = outcome.take().ok_or_else(|| missing_step(step))?;
                    let result = workflow::format_results(input);
                    let output = step_output(&result)?;
                    formatted = Some(result);
                    output
                }
            };
            emitter.finish_step(Some(output)).await?;
        }

        let formatted_results =
            formatted.ok_or_else(|| missing_step(WorkflowStep::FormatResults))?;
        let success = formatted_results.success;
        tracing::debug!(
            workflow = workflow_id,
            success,
            flights = formatted_results.total_results,
            "workflow completed"
        );

        emitter.delta("✅ Workflow completed successfully!\n\n").await?;
        emitter
            .custom(WORKFLOW_RESULT, step_output(&WorkflowOutput { formatted_results })?)
            .await?;
        emitter.end_message().await?;

        Ok(json!({ "success": success, "toolCallCount": 0 }))
    }
}

/// One start/args/result/end group per call, in call order, each followed
/// by its `FLIGHT_SEARCH_RESULT`.
async fn replay_tool_calls(emitter: &mut EventEmitter, generation: &Generation) -> AgentResult<()> {
    for call in &generation.tool_calls {
        let result = emitter.tool_call(call).await?;
        emitter.custom(FLIGHT_SEARCH_RESULT, result).await?;
    }
    Ok(())
}

/// Applies `change` to the run state and logs the resulting patch.
fn track(state: &StateManager<RunState>, change: impl FnOnce(&mut RunState)) -> AgentResult<()> {
    let patch = state.update(change)?;
    if !patch.is_empty() {
        tracing::debug!(
            revision = state.revision(),
            ops = %JsonValue::from(patch.to_json_ops()),
            "run state changed"
        );
    }
    Ok(())
}

fn step_output<T: serde::Serialize>(value: &T) -> AgentResult<JsonValue> {
    serde_json::to_value(value)
        .map_err(|e| AgentError::custom_with_source("failed to encode workflow step output", e))
}

fn missing_step(step: WorkflowStep) -> AgentError {
    crate::internal_error!("workflow step '{}' ran without its input", step.id())
}

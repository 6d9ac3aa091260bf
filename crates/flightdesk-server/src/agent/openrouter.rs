//! OpenRouter (or any OpenAI-compatible) chat-completions agent.

use super::{
    Agent, AgentContext, GenerateOptions, Generation, HealthStatus, ToolChoice, ToolInvocation,
    INSTRUCTIONS,
};
use crate::config::OpenRouterConfig;
use crate::error::{AgentError, AgentResult, ToolError, TransportError};
use crate::tools::{ToolDefinition, ToolKind, ToolRegistry};
use async_trait::async_trait;
use flightdesk_core::types::{ChatMessage, Role, ToolCallId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "OpenRouter";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: role.as_str().to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::text(Role::Tool, content)
        }
    }
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        // The developer role is not understood by every routed model.
        let role = match message.role {
            Role::Developer => Role::System,
            other => other,
        };
        Self {
            tool_call_id: message.tool_call_id.clone(),
            ..Self::text(role, message.content.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WireTool {
    r#type: String,
    function: WireFunction,
}

impl From<ToolDefinition> for WireTool {
    fn from(definition: ToolDefinition) -> Self {
        Self {
            r#type: "function".to_string(),
            function: WireFunction {
                name: definition.name,
                description: definition.description,
                parameters: definition.parameters,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: WireFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [WireTool]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: WireMessage,
}

fn upstream(message: impl Into<String>) -> AgentError {
    AgentError::Upstream {
        service: SERVICE,
        message: message.into(),
    }
}

fn aborted() -> AgentError {
    AgentError::Aborted {
        reason: "client disconnected during model call".into(),
    }
}

fn timed_out(limit: Duration) -> AgentError {
    AgentError::Transport(TransportError::Timeout {
        duration_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
    })
}

fn transport(err: &reqwest::Error, limit: Duration) -> AgentError {
    if err.is_timeout() {
        timed_out(limit)
    } else {
        upstream(err.to_string())
    }
}

/// Resolves a model tool call into the tool it names and its decoded
/// arguments.
fn parse_call(call: &WireFunctionCall) -> Result<(ToolKind, Value), ToolError> {
    let kind = ToolKind::from_id(&call.name).ok_or_else(|| ToolError::UnknownTool {
        name: call.name.clone(),
    })?;
    let args = serde_json::from_str(&call.arguments).map_err(|e| ToolError::InvalidArguments {
        tool: kind.id(),
        reason: format!("arguments are not JSON: {e}"),
    })?;
    Ok((kind, args))
}

/// Agent backed by an OpenAI-compatible chat-completions API.
///
/// Tool calls returned by the model are executed through the registry and
/// their outputs fed back until the model produces a final answer.
#[derive(Debug, Clone)]
pub struct OpenRouterAgent {
    config: OpenRouterConfig,
    client: reqwest::Client,
    tools: Arc<ToolRegistry>,
    wire_tools: Vec<WireTool>,
}

impl OpenRouterAgent {
    /// Agent calling `config.base_url` and running tools from `tools`.
    #[must_use]
    pub fn new(config: OpenRouterConfig, client: reqwest::Client, tools: Arc<ToolRegistry>) -> Self {
        let wire_tools = tools.definitions().into_iter().map(WireTool::from).collect();
        Self {
            config,
            client,
            tools,
            wire_tools,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn conversation(messages: &[ChatMessage]) -> Vec<WireMessage> {
        let mut conversation = Vec::with_capacity(messages.len() + 1);
        if !messages.iter().any(|m| m.role == Role::System) {
            conversation.push(WireMessage::text(Role::System, INSTRUCTIONS));
        }
        conversation.extend(messages.iter().map(WireMessage::from));
        conversation
    }

    fn request<'a>(
        &'a self,
        messages: &'a [WireMessage],
        choice: ToolChoice,
    ) -> ChatRequest<'a> {
        let offer_tools = choice != ToolChoice::None && !self.wire_tools.is_empty();
        ChatRequest {
            model: &self.config.model,
            messages,
            tools: offer_tools.then_some(self.wire_tools.as_slice()),
            tool_choice: offer_tools.then_some(choice.as_str()),
        }
    }

    async fn send(&self, request: &ChatRequest<'_>) -> AgentResult<reqwest::Response> {
        let limit = self.config.timeout;
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .timeout(limit)
            .json(request)
            .send()
            .await
            .map_err(|e| transport(&e, limit))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream(format!("status {}: {body}", status.as_u16())));
        }
        Ok(response)
    }

    async fn complete(&self, request: &ChatRequest<'_>, ctx: &AgentContext) -> AgentResult<WireMessage> {
        let call = async {
            let response: ChatResponse = self
                .send(request)
                .await?
                .json()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        timed_out(self.config.timeout)
                    } else {
                        upstream(format!("invalid response: {e}"))
                    }
                })?;
            response
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message)
                .ok_or_else(|| upstream("response has no choices"))
        };
        tokio::select! {
            biased;
            () = ctx.cancelled() => Err(aborted()),
            message = call => message,
        }
    }
}

#[async_trait]
impl Agent for OpenRouterAgent {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
        ctx: &AgentContext,
    ) -> AgentResult<Generation> {
        let mut conversation = Self::conversation(messages);
        let mut invocations: Vec<ToolInvocation> = Vec::new();

        for step in 0..options.max_steps.max(1) {
            // Once a tool has answered, the model is free to reply in text.
            let choice = if invocations.is_empty() {
                options.tool_choice
            } else {
                ToolChoice::Auto
            };
            let request = self.request(&conversation, choice);
            let reply = self.complete(&request, ctx).await?;

            let calls = reply.tool_calls.clone().unwrap_or_default();
            tracing::debug!(step, tool_calls = calls.len(), "model reply");
            if calls.is_empty() {
                return Ok(Generation {
                    text: reply.content.unwrap_or_default(),
                    tool_calls: invocations,
                });
            }

            conversation.push(reply);
            for call in calls {
                let (kind, args) = parse_call(&call.function)?;
                let (_, output) = tokio::select! {
                    biased;
                    () = ctx.cancelled() => return Err(aborted()),
                    result = self.tools.execute_call(kind.id(), &args) => result?,
                };
                let content = serde_json::to_string(&output)
                    .map_err(|e| AgentError::custom_with_source("failed to encode tool output", e))?;
                conversation.push(WireMessage::tool_result(call.id.clone(), content));

                let id = if call.id.trim().is_empty() {
                    ToolCallId::random()
                } else {
                    ToolCallId::new(call.id)
                };
                invocations.push(ToolInvocation {
                    id,
                    kind,
                    args,
                    output,
                });
            }
        }

        tracing::warn!(max_steps = options.max_steps, "step limit reached before a final answer");
        Ok(Generation {
            text: String::new(),
            tool_calls: invocations,
        })
    }

    async fn health(&self) -> AgentResult<HealthStatus> {
        if self.config.api_key.trim().is_empty() {
            return Ok(HealthStatus::unhealthy("OpenRouter API key is empty"));
        }
        Ok(HealthStatus::Healthy)
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

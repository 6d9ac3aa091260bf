//! Deterministic offline agent.
//!
//! Reads search parameters from the JSON object embedded in the last user
//! message and picks a tool from the words around it. Used when no model
//! API key is configured and throughout the test-suite.

use super::{
    Agent, AgentContext, GenerateOptions, Generation, HealthStatus, ToolChoice, ToolInvocation,
};
use crate::error::{AgentError, AgentResult};
use crate::tools::{ToolKind, ToolRegistry};
use async_trait::async_trait;
use flightdesk_core::flight::SearchParams;
use flightdesk_core::types::{ChatMessage, Role, ToolCallId};
use std::sync::Arc;

const NEEDS_DETAILS: &str = "I can search flights for you. Tell me where you are flying from and to, and your departure date (YYYY-MM-DD).";

/// Offline agent with keyword tool selection.
#[derive(Debug, Clone)]
pub struct ScriptedAgent {
    tools: Arc<ToolRegistry>,
}

impl ScriptedAgent {
    /// Agent running tools from `tools`.
    #[must_use]
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    /// Splits `text` into the prose before the first `{` and the search
    /// parameters decoded from there, if any.
    #[must_use]
    pub fn parse_request(text: &str) -> (&str, Option<SearchParams>) {
        let Some(start) = text.find('{') else {
            return (text, None);
        };
        let params = serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<SearchParams>()
            .next()
            .and_then(Result::ok);
        (&text[..start], params)
    }

    fn pick_tool(&self, prose: &str) -> ToolKind {
        let preferred = ToolKind::for_message(prose);
        if self.tools.has(preferred) {
            preferred
        } else {
            ToolKind::EnhancedFlights
        }
    }

    fn last_user_text(messages: &[ChatMessage]) -> &str {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map_or("", |m| m.content.as_str())
    }

    fn chat_reply(text: &str) -> String {
        let lower = text.to_lowercase();
        if lower.contains("flight") || lower.contains("fly") || lower.contains("trip") {
            NEEDS_DETAILS.to_string()
        } else if lower.trim().is_empty() {
            "How can I help with your travel plans?".to_string()
        } else {
            format!("You said: \"{}\". {NEEDS_DETAILS}", text.trim())
        }
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerateOptions,
        ctx: &AgentContext,
    ) -> AgentResult<Generation> {
        if ctx.is_cancelled() {
            return Err(AgentError::Aborted {
                reason: "cancelled before generation".into(),
            });
        }

        let text = Self::last_user_text(messages);
        let (prose, params) = Self::parse_request(text);

        let params = match (options.tool_choice, params) {
            (ToolChoice::None, _) | (_, None) => {
                return Ok(Generation {
                    text: Self::chat_reply(prose),
                    tool_calls: Vec::new(),
                });
            }
            (_, Some(params)) => params,
        };

        let kind = self.pick_tool(prose);
        let output = self.tools.execute(kind, &params).await?;
        tracing::debug!(tool = %kind, flights = output.total_results, "scripted tool call");

        let mut answer = output.summary.clone();
        if let Some(cheapest) = output.flights.iter().min_by_key(|f| f.price.amount) {
            answer.push_str(&format!(
                " The lowest fare is ${} with {} {}, departing {}.",
                cheapest.price.amount,
                cheapest.airline.name,
                cheapest.flight_number,
                cheapest.schedule.departure.scheduled,
            ));
        }

        let args = serde_json::to_value(&params)
            .map_err(|e| AgentError::custom_with_source("failed to encode tool arguments", e))?;

        Ok(Generation {
            text: answer,
            tool_calls: vec![ToolInvocation {
                id: ToolCallId::random(),
                kind,
                args,
                output,
            }],
        })
    }

    async fn health(&self) -> AgentResult<HealthStatus> {
        Ok(HealthStatus::degraded(
            "offline scripted agent; set OPENROUTER_API_KEY for model answers",
        ))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn agent() -> ScriptedAgent {
        ScriptedAgent::new(Arc::new(ToolRegistry::offline()))
    }

    const REQUEST: &str = r#"Check history for {"origin":"NYC","destination":"SFO","departureDate":"2025-07-20"} please"#;

    #[test]
    fn parses_embedded_params() {
        let (prose, params) = ScriptedAgent::parse_request(REQUEST);
        assert_eq!(prose, "Check history for ");
        let params = params.expect("params parsed");
        assert_eq!(params.origin, "NYC");
        assert_eq!(params.passengers.adults, 1);

        assert_matches!(ScriptedAgent::parse_request("no json here"), (_, None));
        assert_matches!(ScriptedAgent::parse_request("broken {json"), (_, None));
    }

    #[tokio::test]
    async fn required_choice_calls_a_tool() {
        let generation = agent()
            .generate(
                &[ChatMessage::user(REQUEST)],
                &GenerateOptions::new(ToolChoice::Required),
                &AgentContext::empty(),
            )
            .await
            .expect("generation succeeds");

        assert_eq!(generation.tool_calls.len(), 1);
        let call = &generation.tool_calls[0];
        assert_eq!(call.kind, ToolKind::HistoricalFlights);
        assert_eq!(call.args["origin"], "NYC");
        assert!(call.id.as_str().starts_with("call_"));
        assert!(generation.text.contains("The lowest fare is $"));
    }

    #[tokio::test]
    async fn unregistered_tool_falls_back_to_enhanced() {
        let request = REQUEST.replace("Check history for", "Live data for");
        let generation = agent()
            .generate(
                &[ChatMessage::user(request)],
                &GenerateOptions::default(),
                &AgentContext::empty(),
            )
            .await
            .expect("generation succeeds");
        assert_eq!(generation.tool_calls[0].kind, ToolKind::EnhancedFlights);
    }

    #[tokio::test]
    async fn no_params_means_no_tool_call() {
        let generation = agent()
            .generate(
                &[ChatMessage::user("I want to fly somewhere warm")],
                &GenerateOptions::new(ToolChoice::Required),
                &AgentContext::empty(),
            )
            .await
            .expect("generation succeeds");
        assert!(!generation.has_tool_calls());
        assert_eq!(generation.text, NEEDS_DETAILS);
    }

    #[tokio::test]
    async fn cancelled_context_aborts() {
        let ctx = AgentContext::empty();
        ctx.cancel();
        let err = agent()
            .generate(&[ChatMessage::user(REQUEST)], &GenerateOptions::default(), &ctx)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn small_talk_is_answered_without_tools() {
        let generation = agent()
            .generate(
                &[ChatMessage::user("hello there")],
                &GenerateOptions::new(ToolChoice::Auto),
                &AgentContext::empty(),
            )
            .await
            .expect("reply");
        assert!(generation.tool_calls.is_empty());
        assert!(generation.text.starts_with("You said: \"hello there\"."));
    }
}

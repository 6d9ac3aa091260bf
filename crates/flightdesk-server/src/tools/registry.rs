//! Tool registry: kind → handler, plus the schemas offered to the model.

use super::enhanced::EnhancedMockTool;
use super::historical::HistoricalTool;
use super::opensky::OpenSkyTool;
use super::weather::WeatherTool;
use super::{FlightTool, ToolKind, ToolOutput};
use crate::config::UpstreamConfig;
use crate::error::{ToolError, ToolResult};
use flightdesk_core::flight::SearchParams;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Function definition offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    /// Tool id.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON Schema of the arguments.
    pub parameters: Value,
}

/// JSON Schema shared by all four tools.
#[must_use]
pub fn search_params_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "origin": {
                "type": "string",
                "description": "Origin airport code (e.g., NYC, LAX)"
            },
            "destination": {
                "type": "string",
                "description": "Destination airport code (e.g., NYC, LAX)"
            },
            "departureDate": {
                "type": "string",
                "description": "Departure date in YYYY-MM-DD format"
            },
            "returnDate": {
                "type": ["string", "null"],
                "description": "Return date for round trip in YYYY-MM-DD format"
            },
            "passengers": {
                "type": "object",
                "properties": {
                    "adults": {"type": "integer", "minimum": 1, "description": "Number of adult passengers"},
                    "children": {"type": "integer", "minimum": 0, "description": "Number of child passengers"},
                    "infants": {"type": "integer", "minimum": 0, "description": "Number of infant passengers"}
                },
                "required": ["adults", "children", "infants"]
            },
            "class": {
                "type": "string",
                "enum": ["economy", "premium-economy", "business", "first"],
                "description": "Flight class preference"
            },
            "tripType": {
                "type": "string",
                "enum": ["one-way", "round-trip"],
                "description": "Type of trip"
            }
        },
        "required": ["origin", "destination", "departureDate", "passengers", "class", "tripType"]
    })
}

/// Maps each [`ToolKind`] to its handler.
///
/// Cloning shares the handlers.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<ToolKind, Arc<dyn FlightTool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.kinds())
            .finish()
    }
}

impl ToolRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All four tools, with the live providers calling `upstream`.
    #[must_use]
    pub fn with_upstream(client: reqwest::Client, upstream: &UpstreamConfig) -> Self {
        let mut registry = Self::new();
        registry.register(OpenSkyTool::new(client.clone(), &upstream.opensky_base_url));
        registry.register(WeatherTool::new(client, &upstream.open_meteo_base_url));
        registry.register(HistoricalTool);
        registry.register(EnhancedMockTool);
        registry
    }

    /// Only the tools that never touch the network.
    #[must_use]
    pub fn offline() -> Self {
        let mut registry = Self::new();
        registry.register(HistoricalTool);
        registry.register(EnhancedMockTool);
        registry
    }

    /// Registers a handler, replacing any handler of the same kind.
    pub fn register(&mut self, tool: impl FlightTool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    /// Registers a shared handler.
    pub fn register_arc(&mut self, tool: Arc<dyn FlightTool>) {
        self.tools.insert(tool.kind(), tool);
    }

    /// Handler for `kind`.
    #[must_use]
    pub fn get(&self, kind: ToolKind) -> Option<&Arc<dyn FlightTool>> {
        self.tools.get(&kind)
    }

    /// Whether `kind` has a handler.
    #[must_use]
    pub fn has(&self, kind: ToolKind) -> bool {
        self.tools.contains_key(&kind)
    }

    /// Number of handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered kinds in canonical order.
    #[must_use]
    pub fn kinds(&self) -> Vec<ToolKind> {
        ToolKind::ALL.into_iter().filter(|k| self.has(*k)).collect()
    }

    /// Definitions for every registered tool.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.kinds()
            .into_iter()
            .map(|kind| ToolDefinition {
                name: kind.id().to_string(),
                description: kind.description().to_string(),
                parameters: search_params_schema(),
            })
            .collect()
    }

    /// Validates `params` and runs the `kind` tool.
    ///
    /// # Errors
    ///
    /// - [`ToolError::UnknownTool`] if no handler is registered for `kind`
    /// - [`ToolError::Validation`] if the parameters are unusable
    #[allow(clippy::cast_possible_truncation)]
    pub async fn execute(&self, kind: ToolKind, params: &SearchParams) -> ToolResult<ToolOutput> {
        let tool = self.get(kind).ok_or_else(|| ToolError::UnknownTool {
            name: kind.id().to_string(),
        })?;

        let params = params.normalized();
        params.validate()?;

        let started = Instant::now();
        let result = tool.search(&params).await;
        tracing::info!(
            tool = %kind,
            origin = %params.origin,
            destination = %params.destination,
            source = ?result.source,
            flights = result.data.flights.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tool executed"
        );

        Ok(ToolOutput::from_result(kind, &params, result))
    }

    /// Runs a tool call as the model phrased it: a tool id and JSON arguments.
    ///
    /// # Errors
    ///
    /// - [`ToolError::UnknownTool`] for an unrecognised or unregistered id
    /// - [`ToolError::InvalidArguments`] if the arguments do not decode
    /// - [`ToolError::Validation`] if the parameters are unusable
    pub async fn execute_call(
        &self,
        name: &str,
        arguments: &Value,
    ) -> ToolResult<(ToolKind, ToolOutput)> {
        let kind = ToolKind::from_id(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        let params: SearchParams =
            serde_json::from_value(arguments.clone()).map_err(|e| ToolError::InvalidArguments {
                tool: kind.id(),
                reason: e.to_string(),
            })?;
        let output = self.execute(kind, &params).await?;
        Ok((kind, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn upstream_registry_has_all_tools() {
        let registry = ToolRegistry::with_upstream(reqwest::Client::new(), &UpstreamConfig::default());
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.kinds(), ToolKind::ALL.to_vec());

        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            [
                "search-live-flights",
                "search-flights-weather",
                "search-flights-historical",
                "search-flights-enhanced",
            ]
        );
    }

    #[test]
    fn schema_requires_core_fields() {
        let schema = search_params_schema();
        let required = schema["required"].as_array().expect("required list");
        assert!(required.contains(&json!("origin")));
        assert!(required.contains(&json!("departureDate")));
    }

    #[tokio::test]
    async fn execute_normalizes_codes() {
        let registry = ToolRegistry::offline();
        let output = registry
            .execute(ToolKind::EnhancedFlights, &SearchParams::new(" nyc", "sfo ", "2025-07-20"))
            .await
            .expect("search succeeds");

        assert_eq!(output.total_results, 6);
        assert!(output.summary.starts_with("Found 6 enhanced flights from NYC to SFO."));
    }

    #[tokio::test]
    async fn invalid_params_are_rejected() {
        let registry = ToolRegistry::offline();
        let err = registry
            .execute(ToolKind::EnhancedFlights, &SearchParams::new("NYC", "", "20-07-2025"))
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::Validation(_));
    }

    #[tokio::test]
    async fn unregistered_and_unknown_tools() {
        let registry = ToolRegistry::offline();
        let params = SearchParams::new("NYC", "LAX", "2025-07-20");

        let err = registry.execute(ToolKind::LiveFlights, &params).await.unwrap_err();
        assert_matches!(err, ToolError::UnknownTool { name } if name == "search-live-flights");

        let err = registry
            .execute_call("book-hotel", &json!({}))
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::UnknownTool { .. });
    }

    #[tokio::test]
    async fn execute_call_decodes_arguments() {
        let registry = ToolRegistry::offline();
        let (kind, output) = registry
            .execute_call(
                "search-flights-historical",
                &json!({
                    "origin": "SEA",
                    "destination": "MIA",
                    "departureDate": "2025-10-01",
                    "passengers": {"adults": 2, "children": 0, "infants": 0},
                    "class": "business",
                    "tripType": "one-way"
                }),
            )
            .await
            .expect("call succeeds");

        assert_eq!(kind, ToolKind::HistoricalFlights);
        assert_eq!(output.provider, "Historical Flight Data Service");

        let err = registry
            .execute_call("search-flights-enhanced", &json!({"origin": 42}))
            .await
            .unwrap_err();
        assert_matches!(err, ToolError::InvalidArguments { tool: "search-flights-enhanced", .. });
    }
}

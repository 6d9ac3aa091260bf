//! Flight search tools.
//!
//! The tool set is closed: [`ToolKind`] names the four tools the agent may
//! call, and a [`ToolRegistry`] maps each kind to a [`FlightTool`] handler.
//! Handlers never fail on upstream trouble; a live provider that cannot
//! reach its API returns synthetic data tagged as a fallback.

mod airports;
mod enhanced;
mod historical;
mod opensky;
mod registry;
mod weather;

pub use airports::{airline_for, airport_for, AirlineEntry, AirportEntry, AIRLINES};
pub use enhanced::{EnhancedMock, EnhancedMockTool, ENHANCED_PROVIDER};
pub use historical::{HistoricalTool, HISTORICAL_PROVIDER};
pub use opensky::{OpenSkyTool, LIVE_PROVIDER};
pub use registry::{search_params_schema, ToolDefinition, ToolRegistry};
pub use weather::{weather_condition, WeatherTool, WEATHER_PROVIDER};

use async_trait::async_trait;
use flightdesk_core::flight::{
    price_range, DataSource, FlightRecord, FlightSearchResult, SearchParams, Sourced,
};
use serde::{Deserialize, Serialize};

/// The four flight search tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    /// Live aircraft positions from OpenSky Network.
    #[serde(rename = "search-live-flights")]
    LiveFlights,
    /// Synthetic flights annotated with current weather.
    #[serde(rename = "search-flights-weather")]
    WeatherFlights,
    /// Synthetic flights with performance history.
    #[serde(rename = "search-flights-historical")]
    HistoricalFlights,
    /// Synthetic flights only.
    #[serde(rename = "search-flights-enhanced")]
    EnhancedFlights,
}

impl ToolKind {
    /// Every tool, in the order the test endpoints report them.
    pub const ALL: [ToolKind; 4] = [
        ToolKind::LiveFlights,
        ToolKind::WeatherFlights,
        ToolKind::HistoricalFlights,
        ToolKind::EnhancedFlights,
    ];

    /// Tool id as the model sees it.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            ToolKind::LiveFlights => "search-live-flights",
            ToolKind::WeatherFlights => "search-flights-weather",
            ToolKind::HistoricalFlights => "search-flights-historical",
            ToolKind::EnhancedFlights => "search-flights-enhanced",
        }
    }

    /// Parses a tool id.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Description offered to the model.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            ToolKind::LiveFlights => "Search for flights using real-time flight data from OpenSky Network API (completely free)",
            ToolKind::WeatherFlights => "Search for flights with real-time weather data and delay predictions (free weather API)",
            ToolKind::HistoricalFlights => "Search for flights with historical performance data, price trends, and reliability metrics",
            ToolKind::EnhancedFlights => "Search for flights using enhanced mock data with realistic airline information and pricing",
        }
    }

    /// Display name used by the diagnostic endpoints.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ToolKind::LiveFlights => "Live Flight Search (OpenSky)",
            ToolKind::WeatherFlights => "Weather Flight Search",
            ToolKind::HistoricalFlights => "Historical Flight Search",
            ToolKind::EnhancedFlights => "Enhanced Mock Flight Search",
        }
    }

    /// Short description of the data a tool returns.
    #[must_use]
    pub const fn data_type(self) -> &'static str {
        match self {
            ToolKind::LiveFlights => "Real-time + Mock",
            ToolKind::WeatherFlights => "Real Weather + Mock Flights",
            ToolKind::HistoricalFlights => "Mock Historical Data",
            ToolKind::EnhancedFlights => "Enhanced Mock Data",
        }
    }

    /// Picks a tool from free text: weather, history and live keywords, in
    /// that order, otherwise the enhanced mock.
    #[must_use]
    pub fn for_message(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("weather") {
            ToolKind::WeatherFlights
        } else if text.contains("histor") || text.contains("reliab") || text.contains("on-time") {
            ToolKind::HistoricalFlights
        } else if text.contains("live") || text.contains("real-time") || text.contains("realtime") {
            ToolKind::LiveFlights
        } else {
            ToolKind::EnhancedFlights
        }
    }

    fn summary_detail(self, count: usize, params: &SearchParams) -> String {
        let (o, d) = (&params.origin, &params.destination);
        match self {
            ToolKind::LiveFlights => format!(
                "Found {count} live flights from {o} to {d}. Using real-time data from OpenSky Network."
            ),
            ToolKind::WeatherFlights => format!(
                "Found {count} flights with weather analysis from {o} to {d}. Weather conditions and delay risks included."
            ),
            ToolKind::HistoricalFlights => format!(
                "Found {count} flights with historical performance data from {o} to {d}. Includes on-time performance, price history, and reliability metrics."
            ),
            ToolKind::EnhancedFlights => format!(
                "Found {count} enhanced flights from {o} to {d}. Realistic airline data with detailed aircraft and amenity information."
            ),
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// What a tool call returns to the agent and to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    /// Matching flights.
    pub flights: Vec<FlightRecord>,
    /// Provider search id.
    pub search_id: String,
    /// Always `flights.len()`.
    pub total_results: usize,
    /// Provider display name.
    pub provider: String,
    /// One-line human summary ending in the price range.
    pub summary: String,
    /// Where the data came from.
    pub source: DataSource,
    /// Upstream error when `source` is a fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_error: Option<String>,
}

impl ToolOutput {
    /// Builds the output for `kind` from a provider result.
    #[must_use]
    pub fn from_result(
        kind: ToolKind,
        params: &SearchParams,
        result: Sourced<FlightSearchResult>,
    ) -> Self {
        let Sourced { data, source, error } = result;
        let mut summary = kind.summary_detail(data.flights.len(), params);
        if source == DataSource::Fallback {
            summary.push_str(" Live data was unavailable, so simulated flights are shown.");
        }
        summary.push(' ');
        summary.push_str(&price_range_text(&data.flights));

        Self {
            total_results: data.flights.len(),
            flights: data.flights,
            search_id: data.search_id,
            provider: data.provider,
            summary,
            source,
            upstream_error: error,
        }
    }
}

/// `Price range: $min - $max.`, or `N/A` for no flights.
#[must_use]
pub fn price_range_text(flights: &[FlightRecord]) -> String {
    match price_range(flights) {
        Some((min, max)) => format!("Price range: ${min} - ${max}."),
        None => "Price range: N/A.".to_string(),
    }
}

/// A flight search provider.
///
/// Implementations receive validated, normalized parameters.
#[async_trait]
pub trait FlightTool: Send + Sync {
    /// Which tool this handler implements.
    fn kind(&self) -> ToolKind;

    /// Runs the search. Upstream failures are reported through
    /// [`Sourced::fallback`], never as an error.
    async fn search(&self, params: &SearchParams) -> Sourced<FlightSearchResult>;
}

/// Milliseconds since the epoch, for search ids.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Current time as RFC 3339 with milliseconds.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_id(kind.id()), Some(kind));
            assert_eq!(serde_json::to_value(kind).expect("serializes"), kind.id());
        }
        assert_eq!(ToolKind::from_id("search-trains"), None);
    }

    #[test]
    fn keyword_selection() {
        assert_eq!(
            ToolKind::for_message("Any weather delays on NYC to LAX?"),
            ToolKind::WeatherFlights
        );
        assert_eq!(
            ToolKind::for_message("show me historical on-time stats"),
            ToolKind::HistoricalFlights
        );
        assert_eq!(ToolKind::for_message("live flights please"), ToolKind::LiveFlights);
        assert_eq!(ToolKind::for_message("cheap flights"), ToolKind::EnhancedFlights);
    }

    #[test]
    fn summary_ends_with_price_range() {
        let params = SearchParams::new("NYC", "SFO", "2025-07-20");
        let result = EnhancedMock::seeded(7).search(&params);
        let output =
            ToolOutput::from_result(ToolKind::EnhancedFlights, &params, Sourced::synthetic(result));

        assert_eq!(output.total_results, output.flights.len());
        assert!(output.summary.starts_with("Found 6 enhanced flights from NYC to SFO."));
        let (min, max) = price_range(&output.flights).expect("six flights");
        assert!(output.summary.ends_with(&format!("Price range: ${min} - ${max}.")));
        assert_eq!(output.source, DataSource::Synthetic);
    }

    #[test]
    fn empty_list_has_no_range() {
        assert_eq!(price_range_text(&[]), "Price range: N/A.");
    }
}

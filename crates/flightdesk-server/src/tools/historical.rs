//! Synthetic flights with twelve months of simulated performance history.

use super::enhanced::EnhancedMock;
use super::{FlightTool, ToolKind};
use async_trait::async_trait;
use flightdesk_core::flight::{
    FlightRecord, FlightSearchResult, HistoricalData, PriceHistory, SearchParams, Sourced,
};

/// Provider name for historical results.
pub const HISTORICAL_PROVIDER: &str = "Historical Flight Data Service";

/// The `search-flights-historical` tool. Makes no upstream call.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoricalTool;

impl HistoricalTool {
    /// Annotates a synthetic result with history drawn from `mock`.
    #[must_use]
    pub fn annotate(mock: &mut EnhancedMock, mut result: FlightSearchResult) -> FlightSearchResult {
        let flights: Vec<FlightRecord> = std::mem::take(&mut result.flights)
            .into_iter()
            .map(|mut flight| {
                flight.historical_data = Some(history_for(mock, flight.price.amount));
                flight
            })
            .collect();
        result.set_flights(flights);
        result.provider = HISTORICAL_PROVIDER.to_string();
        if let Some(metadata) = result.metadata.as_object_mut() {
            metadata.insert("historicalData".into(), true.into());
            metadata.insert("dataRange".into(), "12 months".into());
        }
        result
    }
}

fn history_for(mock: &mut EnhancedMock, fare: u32) -> HistoricalData {
    HistoricalData {
        on_time_performance: mock.between(70, 100),
        average_delay: mock.between(0, 45),
        cancellation_rate: mock.between(0, 5),
        popularity_score: mock.between(1, 101),
        price_history: PriceHistory {
            lowest: fare.saturating_sub(mock.between(0, 100)),
            highest: fare + mock.between(0, 200),
            average: (fare + mock.between(0, 50)).saturating_sub(25),
        },
    }
}

#[async_trait]
impl FlightTool for HistoricalTool {
    fn kind(&self) -> ToolKind {
        ToolKind::HistoricalFlights
    }

    async fn search(&self, params: &SearchParams) -> Sourced<FlightSearchResult> {
        let mut mock = EnhancedMock::new();
        let base = mock.search(params);
        Sourced::synthetic(Self::annotate(&mut mock, base))
    }
}

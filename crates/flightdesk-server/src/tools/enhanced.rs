//! Synthetic flights with realistic carriers, aircraft and amenities.
//!
//! Every other provider builds on these records: weather and history
//! annotate them, and the live provider falls back to them.

use super::airports::{airline_for, airport_for};
use super::{now_millis, now_rfc3339, FlightTool, ToolKind};
use async_trait::async_trait;
use flightdesk_core::flight::{
    Aircraft, Amenities, BookingClass, CabinClass, Fare, FlightDuration, FlightRecord,
    FlightSearchResult, Route, Schedule, ScheduledTime, SearchParams, Sourced,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

/// Provider name reported for synthetic results.
pub const ENHANCED_PROVIDER: &str = "Enhanced Mock Service";

const RECORD_COUNT: usize = 6;

const DEPARTURES: [&str; 6] = ["06:30", "09:15", "12:45", "15:20", "18:10", "20:45"];
const DEPARTURES_ESTIMATED: [&str; 6] = ["06:35", "09:20", "12:50", "15:25", "18:15", "20:50"];
const ARRIVALS: [&str; 6] = ["09:45", "12:30", "16:00", "18:35", "21:25", "23:59"];
const ARRIVALS_ESTIMATED: [&str; 6] = ["09:50", "12:35", "16:05", "18:40", "21:30", "00:04"];

const AIRCRAFT: [&str; 4] = [
    "Boeing 737-800",
    "Airbus A320neo",
    "Boeing 777-300ER",
    "Airbus A330-300",
];

const SEATS_PER_AIRCRAFT: u32 = 180;

fn class_multiplier(class: CabinClass) -> f64 {
    match class {
        CabinClass::Economy => 1.0,
        CabinClass::PremiumEconomy => 1.5,
        CabinClass::Business => 2.5,
        CabinClass::First => 4.0,
    }
}

/// Schedule for slot `index` (wraps after six) on `date`.
pub(crate) fn schedule_slot(
    date: &str,
    index: usize,
    departure_gate: String,
    arrival_gate: String,
) -> Schedule {
    let slot = index % DEPARTURES.len();
    Schedule {
        departure: ScheduledTime {
            scheduled: format!("{date}T{}", DEPARTURES[slot]),
            estimated: format!("{date}T{}", DEPARTURES_ESTIMATED[slot]),
            gate: departure_gate,
        },
        arrival: ScheduledTime {
            scheduled: format!("{date}T{}", ARRIVALS[slot]),
            estimated: format!("{date}T{}", ARRIVALS_ESTIMATED[slot]),
            gate: arrival_gate,
        },
    }
}

/// Random source for synthetic records.
#[derive(Debug, Clone)]
pub struct EnhancedMock {
    rng: StdRng,
}

impl Default for EnhancedMock {
    fn default() -> Self {
        Self::new()
    }
}

impl EnhancedMock {
    /// Generator seeded from the OS.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Six records for `params`, one per schedule slot.
    pub fn records(&mut self, params: &SearchParams) -> Vec<FlightRecord> {
        (0..RECORD_COUNT).map(|index| self.record(params, index)).collect()
    }

    /// Full provider result with search id and metadata.
    pub fn search(&mut self, params: &SearchParams) -> FlightSearchResult {
        let flights = self.records(params);
        FlightSearchResult {
            search_id: format!("enhanced-mock-{}", now_millis()),
            total_results: flights.len(),
            flights,
            search_params: params.clone(),
            provider: ENHANCED_PROVIDER.to_string(),
            timestamp: now_rfc3339(),
            metadata: json!({
                "source": "Enhanced Mock Data",
                "apiCost": "FREE",
                "dataFreshness": "Simulated",
            }),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn record(&mut self, params: &SearchParams, index: usize) -> FlightRecord {
        let airline = airline_for(index);
        let origin = airport_for(&params.origin, "NYC");
        let destination = airport_for(&params.destination, "LAX");
        let base_price: u32 = self.rng.gen_range(150..750);
        let amount = (f64::from(base_price) * class_multiplier(params.class)).floor() as u32;

        FlightRecord {
            id: format!("enhanced-mock-{index}"),
            airline: airline.info(),
            flight_number: self.flight_number(airline.code),
            aircraft: Aircraft {
                model: AIRCRAFT[index % AIRCRAFT.len()].to_string(),
                registration: self.registration(),
            },
            route: Route {
                origin: origin.to_ref(Some(self.terminal())),
                destination: destination.to_ref(Some(self.terminal())),
            },
            schedule: schedule_slot(&params.departure_date, index, self.gate(), self.gate()),
            price: Fare {
                amount,
                currency: "USD".to_string(),
                class: params.class,
            },
            duration: self.duration(),
            amenities: self.amenities(params.class),
            booking_class: Some(BookingClass {
                available: self.rng.gen_range(1..=20),
                total: SEATS_PER_AIRCRAFT,
            }),
            live_data: None,
            weather_impact: None,
            historical_data: None,
        }
    }

    pub(crate) fn flight_number(&mut self, carrier: &str) -> String {
        format!("{carrier}{}", self.rng.gen_range(1000..10000))
    }

    pub(crate) fn registration(&mut self) -> String {
        let letter = char::from(b'A' + self.rng.gen_range(0..26u8));
        format!("N{}{letter}", self.rng.gen_range(1000..10000))
    }

    pub(crate) fn terminal(&mut self) -> String {
        format!("Terminal {}", self.rng.gen_range(1..=4))
    }

    pub(crate) fn gate(&mut self) -> String {
        let letter = char::from(b'A' + self.rng.gen_range(0..10u8));
        format!("{letter}{}", self.rng.gen_range(1..=20))
    }

    pub(crate) fn duration(&mut self) -> FlightDuration {
        FlightDuration {
            total: self.rng.gen_range(120..480),
            stops: u32::from(self.rng.gen_bool(0.3)),
        }
    }

    pub(crate) fn amenities(&mut self, class: CabinClass) -> Amenities {
        let wifi = self.rng.gen_bool(0.7);
        let entertainment = self.rng.gen_bool(0.6);
        // drawn for every class so the sequence does not depend on it
        let catered = self.rng.gen_bool(0.5);
        Amenities {
            wifi,
            entertainment,
            meals: class != CabinClass::Economy || catered,
            power_outlets: self.rng.gen_bool(0.4),
        }
    }

    pub(crate) fn chance(&mut self, probability: f64) -> bool {
        self.rng.gen_bool(probability)
    }

    pub(crate) fn between(&mut self, low: u32, high: u32) -> u32 {
        self.rng.gen_range(low..high)
    }
}

/// The `search-flights-enhanced` tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnhancedMockTool;

#[async_trait]
impl FlightTool for EnhancedMockTool {
    fn kind(&self) -> ToolKind {
        ToolKind::EnhancedFlights
    }

    async fn search(&self, params: &SearchParams) -> Sourced<FlightSearchResult> {
        Sourced::synthetic(EnhancedMock::new().search(params))
    }
}

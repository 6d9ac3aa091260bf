//! Flight domain model: search parameters, tool-facing flight records, the
//! segment-based REST records and the envelopes both are returned in.

use crate::error::{CoreError, Result};
use crate::JsonValue;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl CabinClass {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "economy",
            CabinClass::PremiumEconomy => "premium-economy",
            CabinClass::Business => "business",
            CabinClass::First => "first",
        }
    }
}

impl std::fmt::Display for CabinClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TripType {
    #[default]
    OneWay,
    RoundTrip,
    MultiCity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Passengers {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

impl Default for Passengers {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants: 0,
        }
    }
}

impl Passengers {
    pub fn total(&self) -> u32 {
        self.adults + self.children + self.infants
    }
}

/// Structured flight search request.
///
/// Every field has a serde default so a partial body still deserializes;
/// [`SearchParams::missing_required`] and [`SearchParams::validate`] decide
/// whether it is usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchParams {
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    pub passengers: Passengers,
    pub class: CabinClass,
    pub trip_type: TripType,
}

impl SearchParams {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure_date: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            departure_date: departure_date.into(),
            ..Self::default()
        }
    }

    pub fn with_class(mut self, class: CabinClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_return(mut self, return_date: impl Into<String>) -> Self {
        self.return_date = Some(return_date.into());
        self.trip_type = TripType::RoundTrip;
        self
    }

    /// Names of the required fields that are empty, in declaration order.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.origin.trim().is_empty() {
            missing.push("origin");
        }
        if self.destination.trim().is_empty() {
            missing.push("destination");
        }
        if self.departure_date.trim().is_empty() {
            missing.push("departureDate");
        }
        missing
    }

    /// Full validation: required fields, date formats, passenger counts.
    pub fn validate(&self) -> Result<()> {
        let mut problems: Vec<String> = self
            .missing_required()
            .into_iter()
            .map(|field| format!("{field} is required"))
            .collect();

        let departure = if self.departure_date.trim().is_empty() {
            None
        } else {
            match NaiveDate::parse_from_str(&self.departure_date, DATE_FORMAT) {
                Ok(date) => Some(date),
                Err(_) => {
                    problems.push(format!(
                        "departureDate '{}' is not YYYY-MM-DD",
                        self.departure_date
                    ));
                    None
                }
            }
        };

        if let Some(ret) = &self.return_date {
            match NaiveDate::parse_from_str(ret, DATE_FORMAT) {
                Ok(ret_date) => {
                    if departure.is_some_and(|dep| ret_date < dep) {
                        problems.push("returnDate is before departureDate".to_string());
                    }
                }
                Err(_) => problems.push(format!("returnDate '{ret}' is not YYYY-MM-DD")),
            }
        }

        if self.passengers.adults < 1 {
            problems.push("at least one adult passenger is required".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(problems))
        }
    }

    /// Copy with trimmed, upper-cased airport codes.
    pub fn normalized(&self) -> Self {
        Self {
            origin: self.origin.trim().to_uppercase(),
            destination: self.destination.trim().to_uppercase(),
            departure_date: self.departure_date.trim().to_string(),
            ..self.clone()
        }
    }
}

// Tool-facing flight records

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirlineInfo {
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aircraft {
    #[serde(rename = "type")]
    pub model: String,
    pub registration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirportRef {
    pub code: String,
    pub name: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub origin: AirportRef,
    pub destination: AirportRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTime {
    pub scheduled: String,
    pub estimated: String,
    pub gate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub departure: ScheduledTime,
    pub arrival: ScheduledTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fare {
    pub amount: u32,
    pub currency: String,
    pub class: CabinClass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightDuration {
    /// Minutes.
    pub total: u32,
    pub stops: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amenities {
    pub wifi: bool,
    pub entertainment: bool,
    pub meals: bool,
    pub power_outlets: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingClass {
    pub available: u32,
    pub total: u32,
}

/// Position report attached to records built from live tracking data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveData {
    pub altitude: f64,
    pub speed: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub heading: f64,
    pub vertical_rate: f64,
    pub status: String,
    pub last_update: String,
    pub real_time_source: String,
    pub data_age: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayRisk {
    Low,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub condition: String,
    pub temperature: f64,
    pub wind_speed: f64,
    pub delay_risk: DelayRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherImpact {
    pub origin: WeatherReport,
    pub destination: WeatherReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub lowest: u32,
    pub highest: u32,
    pub average: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalData {
    /// Percent.
    pub on_time_performance: u32,
    /// Minutes.
    pub average_delay: u32,
    /// Percent.
    pub cancellation_rate: u32,
    pub popularity_score: u32,
    pub price_history: PriceHistory,
}

/// A flight as returned by the search tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightRecord {
    pub id: String,
    pub airline: AirlineInfo,
    pub flight_number: String,
    pub aircraft: Aircraft,
    pub route: Route,
    pub schedule: Schedule,
    pub price: Fare,
    pub duration: FlightDuration,
    pub amenities: Amenities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_class: Option<BookingClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_data: Option<LiveData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_impact: Option<WeatherImpact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical_data: Option<HistoricalData>,
}

/// Lowest and highest fare, `None` for an empty list.
pub fn price_range(records: &[FlightRecord]) -> Option<(u32, u32)> {
    let min = records.iter().map(|r| r.price.amount).min()?;
    let max = records.iter().map(|r| r.price.amount).max()?;
    Some((min, max))
}

/// Envelope produced by a flight provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSearchResult {
    pub search_id: String,
    pub flights: Vec<FlightRecord>,
    pub total_results: usize,
    pub search_params: SearchParams,
    pub provider: String,
    pub timestamp: String,
    pub metadata: JsonValue,
}

impl FlightSearchResult {
    /// Replaces the flight list, keeping `totalResults` in step.
    pub fn set_flights(&mut self, flights: Vec<FlightRecord>) {
        self.total_results = flights.len();
        self.flights = flights;
    }
}

// REST search records

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub code: String,
    pub name: String,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentEndpoint {
    pub airport: Airport,
    /// RFC 3339.
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSegment {
    pub id: String,
    pub airline: AirlineInfo,
    pub flight_number: String,
    pub departure: SegmentEndpoint,
    pub arrival: SegmentEndpoint,
    /// Minutes.
    pub duration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aircraft: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub base_fare: u32,
    pub taxes: u32,
    pub fees: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: u32,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<PriceBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baggage {
    pub carry: String,
    pub checked: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub id: String,
    pub segments: Vec<FlightSegment>,
    pub price: Price,
    pub class: CabinClass,
    pub available_seats: u32,
    /// Minutes.
    pub total_duration: u32,
    pub stops: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baggage: Option<Baggage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSearchResponse {
    pub flights: Vec<Flight>,
    pub search_id: String,
    pub total_results: usize,
    pub search_params: SearchParams,
}

impl FlightSearchResponse {
    /// Builds a response with flights sorted by ascending price.
    pub fn sorted(mut flights: Vec<Flight>, search_id: String, search_params: SearchParams) -> Self {
        flights.sort_by_key(|f| f.price.amount);
        Self {
            total_results: flights.len(),
            flights,
            search_id,
            search_params,
        }
    }
}

/// Where a result's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Upstream public API answered.
    Live,
    /// Upstream failed; synthetic data was substituted.
    Fallback,
    /// No upstream involved.
    Synthetic,
}

/// Data tagged with its provenance. A fallback carries the upstream error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub data: T,
    pub source: DataSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Sourced<T> {
    pub fn live(data: T) -> Self {
        Self {
            data,
            source: DataSource::Live,
            error: None,
        }
    }

    pub fn synthetic(data: T) -> Self {
        Self {
            data,
            source: DataSource::Synthetic,
            error: None,
        }
    }

    pub fn fallback(data: T, error: impl Into<String>) -> Self {
        Self {
            data,
            source: DataSource::Fallback,
            error: Some(error.into()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == DataSource::Fallback
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced {
            data: f(self.data),
            source: self.source,
            error: self.error,
        }
    }
}

//! Synthetic flights annotated with current weather from Open-Meteo.

use super::airports::{airport_for, AirportEntry};
use super::enhanced::EnhancedMock;
use super::{FlightTool, ToolKind};
use crate::error::{ToolError, ToolResult};
use async_trait::async_trait;
use flightdesk_core::flight::{
    DelayRisk, FlightSearchResult, SearchParams, Sourced, WeatherImpact, WeatherReport,
};
use serde_json::Value;

/// Provider name for weather-annotated results.
pub const WEATHER_PROVIDER: &str = "Weather-Enhanced Flight Search";

const SERVICE: &str = "Open-Meteo API";

/// WMO weather codes above this carry a high delay risk.
const HIGH_RISK_CODE: i64 = 50;

/// Condition label for a WMO weather code.
#[must_use]
pub fn weather_condition(code: i64) -> &'static str {
    match code {
        i64::MIN..=0 => "Clear",
        1..=3 => "Partly Cloudy",
        4..=48 => "Foggy",
        49..=67 => "Rainy",
        68..=77 => "Snowy",
        _ => "Stormy",
    }
}

/// Builds a report from an Open-Meteo `current_weather` object, using the
/// given defaults for missing readings.
fn report(current: &Value, default_temperature: f64, default_wind: f64) -> WeatherReport {
    let code = current.get("weathercode").and_then(Value::as_i64).unwrap_or(0);
    WeatherReport {
        condition: weather_condition(code).to_string(),
        temperature: current
            .get("temperature")
            .and_then(Value::as_f64)
            .unwrap_or(default_temperature),
        wind_speed: current
            .get("windspeed")
            .and_then(Value::as_f64)
            .unwrap_or(default_wind),
        delay_risk: if code > HIGH_RISK_CODE {
            DelayRisk::High
        } else {
            DelayRisk::Low
        },
    }
}

/// The `search-flights-weather` tool.
#[derive(Debug, Clone)]
pub struct WeatherTool {
    client: reqwest::Client,
    base_url: String,
}

impl WeatherTool {
    /// Tool calling `base_url` (e.g. `https://api.open-meteo.com/v1`).
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Current weather at `airport`, as the raw `current_weather` object.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Upstream`] on transport failure, a non-success
    /// status, or an undecodable body.
    pub async fn current_weather(&self, airport: &AirportEntry) -> ToolResult<Value> {
        let url = format!("{}/forecast", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", airport.latitude.to_string()),
                ("longitude", airport.longitude.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ToolError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::upstream(SERVICE, status.as_u16().to_string()));
        }

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::upstream(SERVICE, format!("invalid response: {e}")))?;
        Ok(body
            .get_mut("current_weather")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// Attaches weather to every flight and records the raw readings.
    #[must_use]
    pub fn annotate(
        mut result: FlightSearchResult,
        origin_weather: Value,
        destination_weather: Value,
    ) -> FlightSearchResult {
        let impact = WeatherImpact {
            origin: report(&origin_weather, 20.0, 10.0),
            destination: report(&destination_weather, 22.0, 8.0),
        };
        for flight in &mut result.flights {
            flight.weather_impact = Some(impact.clone());
        }
        result.provider = WEATHER_PROVIDER.to_string();
        if let Some(metadata) = result.metadata.as_object_mut() {
            metadata.insert("weatherData".into(), true.into());
            metadata.insert("originWeather".into(), origin_weather);
            metadata.insert("destWeather".into(), destination_weather);
        }
        result
    }
}

#[async_trait]
impl FlightTool for WeatherTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WeatherFlights
    }

    async fn search(&self, params: &SearchParams) -> Sourced<FlightSearchResult> {
        let origin = airport_for(&params.origin, "NYC");
        let destination = airport_for(&params.destination, "LAX");

        let readings = tokio::try_join!(
            self.current_weather(origin),
            self.current_weather(destination)
        );
        let base = EnhancedMock::new().search(params);
        match readings {
            Ok((origin_weather, destination_weather)) => {
                Sourced::live(Self::annotate(base, origin_weather, destination_weather))
            }
            Err(err) => {
                tracing::warn!(error = %err, "weather search falling back to synthetic data");
                Sourced::fallback(base, err.to_string())
            }
        }
    }
}

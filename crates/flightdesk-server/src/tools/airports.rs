//! Reference airlines and airports for the tool records.

use flightdesk_core::flight::{AirlineInfo, AirportRef};

/// Carrier used for synthetic and live records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirlineEntry {
    /// IATA code.
    pub code: &'static str,
    /// Display name.
    pub name: &'static str,
}

impl AirlineEntry {
    /// Record form with the carrier logo URL.
    #[must_use]
    pub fn info(&self) -> AirlineInfo {
        AirlineInfo {
            code: self.code.to_string(),
            name: self.name.to_string(),
            logo: Some(format!("https://images.kiwi.com/airlines/64/{}.png", self.code)),
        }
    }
}

/// Carriers cycled through by index.
pub const AIRLINES: [AirlineEntry; 6] = [
    AirlineEntry { code: "AA", name: "American Airlines" },
    AirlineEntry { code: "DL", name: "Delta Air Lines" },
    AirlineEntry { code: "UA", name: "United Airlines" },
    AirlineEntry { code: "SW", name: "Southwest Airlines" },
    AirlineEntry { code: "JB", name: "JetBlue Airways" },
    AirlineEntry { code: "AS", name: "Alaska Airlines" },
];

/// Carrier for the `index`-th record.
#[must_use]
pub fn airline_for(index: usize) -> &'static AirlineEntry {
    &AIRLINES[index % AIRLINES.len()]
}

/// Known airport, keyed by the code users type (`NYC`, `CHI`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirportEntry {
    /// Code accepted in search parameters.
    pub key: &'static str,
    /// IATA code of the airport itself.
    pub code: &'static str,
    /// Airport name.
    pub name: &'static str,
    /// City served.
    pub city: &'static str,
    /// Degrees north.
    pub latitude: f64,
    /// Degrees east.
    pub longitude: f64,
}

impl AirportEntry {
    /// Record form with an optional terminal.
    #[must_use]
    pub fn to_ref(&self, terminal: Option<String>) -> AirportRef {
        AirportRef {
            code: self.code.to_string(),
            name: self.name.to_string(),
            city: self.city.to_string(),
            terminal,
        }
    }
}

const AIRPORTS: [AirportEntry; 6] = [
    AirportEntry {
        key: "NYC",
        code: "JFK",
        name: "John F. Kennedy International",
        city: "New York",
        latitude: 40.7128,
        longitude: -74.0060,
    },
    AirportEntry {
        key: "LAX",
        code: "LAX",
        name: "Los Angeles International",
        city: "Los Angeles",
        latitude: 34.0522,
        longitude: -118.2437,
    },
    AirportEntry {
        key: "SFO",
        code: "SFO",
        name: "San Francisco International",
        city: "San Francisco",
        latitude: 37.6213,
        longitude: -122.3790,
    },
    AirportEntry {
        key: "CHI",
        code: "ORD",
        name: "O'Hare International",
        city: "Chicago",
        latitude: 41.9742,
        longitude: -87.9073,
    },
    AirportEntry {
        key: "MIA",
        code: "MIA",
        name: "Miami International",
        city: "Miami",
        latitude: 25.7959,
        longitude: -80.2870,
    },
    AirportEntry {
        key: "SEA",
        code: "SEA",
        name: "Seattle-Tacoma International",
        city: "Seattle",
        latitude: 47.4502,
        longitude: -122.3088,
    },
];

/// Looks up `code` by search key or IATA code. Unknown codes resolve to the
/// airport keyed `fallback`.
#[must_use]
pub fn airport_for(code: &str, fallback: &str) -> &'static AirportEntry {
    let find = |needle: &str| {
        AIRPORTS
            .iter()
            .find(|a| a.key.eq_ignore_ascii_case(needle) || a.code.eq_ignore_ascii_case(needle))
    };
    find(code).or_else(|| find(fallback)).unwrap_or(&AIRPORTS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_keys_map_to_airports() {
        assert_eq!(airport_for("NYC", "NYC").code, "JFK");
        assert_eq!(airport_for("chi", "NYC").code, "ORD");
        assert_eq!(airport_for("ORD", "NYC").city, "Chicago");
    }

    #[test]
    fn unknown_codes_use_fallback() {
        assert_eq!(airport_for("XYZ", "LAX").code, "LAX");
        assert_eq!(airport_for("XYZ", "QQQ").code, "JFK");
    }

    #[test]
    fn airlines_cycle() {
        assert_eq!(airline_for(0).code, "AA");
        assert_eq!(airline_for(6).code, "AA");
        assert_eq!(
            airline_for(4).info().logo.as_deref(),
            Some("https://images.kiwi.com/airlines/64/JB.png")
        );
    }
}

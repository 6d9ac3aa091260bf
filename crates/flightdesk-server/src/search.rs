//! Segment-based flight search behind `POST /api/flights/search`.
//!
//! Results are synthetic; latency is simulated by the caller.

use crate::config::Pacing;
use chrono::{Duration, NaiveDate, SecondsFormat, TimeZone, Utc};
use flightdesk_core::error::{CoreError, Result};
use flightdesk_core::flight::{
    AirlineInfo, Airport, Baggage, CabinClass, Flight, FlightSearchResponse, FlightSegment,
    Price, PriceBreakdown, SearchParams, SegmentEndpoint,
};
use rand::Rng;

const AIRLINES: [(&str, &str); 6] = [
    ("AA", "American Airlines"),
    ("DL", "Delta Air Lines"),
    ("UA", "United Airlines"),
    ("SW", "Southwest Airlines"),
    ("BA", "British Airways"),
    ("LH", "Lufthansa"),
];

const AIRPORTS: [(&str, &str, &str, &str); 6] = [
    ("NYC", "John F. Kennedy International Airport", "New York", "USA"),
    ("LAX", "Los Angeles International Airport", "Los Angeles", "USA"),
    ("LHR", "London Heathrow Airport", "London", "UK"),
    ("CDG", "Charles de Gaulle Airport", "Paris", "France"),
    ("NRT", "Narita International Airport", "Tokyo", "Japan"),
    ("SFO", "San Francisco International Airport", "San Francisco", "USA"),
];

fn airport(code: &str, fallback: &str) -> Airport {
    let lookup = |needle: &str| {
        AIRPORTS
            .iter()
            .find(|(c, ..)| c.eq_ignore_ascii_case(needle))
    };
    let (code, name, city, country) = lookup(code)
        .or_else(|| lookup(fallback))
        .copied()
        .unwrap_or(AIRPORTS[0]);
    Airport {
        code: code.to_string(),
        name: name.to_string(),
        city: city.to_string(),
        country: country.to_string(),
    }
}

fn class_multiplier(class: CabinClass) -> f64 {
    match class {
        CabinClass::Economy => 1.0,
        CabinClass::PremiumEconomy => 1.5,
        CabinClass::Business => 3.0,
        CabinClass::First => 5.0,
    }
}

fn rfc3339(time: chrono::DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn mock_flight<R: Rng>(
    params: &SearchParams,
    date: NaiveDate,
    index: usize,
    rng: &mut R,
) -> Flight {
    let (code, name) = AIRLINES[index % AIRLINES.len()];
    let base_price = 200.0 + (index as f64) * 50.0 + rng.gen_range(0.0..300.0);
    let fare = base_price * class_multiplier(params.class);

    let hour = 6 + (index as u32 * 2) % 18;
    let minute = rng.gen_range(0..60);
    let departure = Utc.from_utc_datetime(&date.and_hms_opt(hour, minute, 0).unwrap_or_default());
    let duration: u32 = rng.gen_range(120..600);
    let arrival = departure + Duration::minutes(i64::from(duration));

    let departure_terminal = format!("T{}", rng.gen_range(1..=3));
    let arrival_terminal = format!("T{}", rng.gen_range(1..=3));

    Flight {
        id: format!("flight_{}", index + 1),
        segments: vec![FlightSegment {
            id: format!("segment_{}", index + 1),
            airline: AirlineInfo {
                code: code.to_string(),
                name: name.to_string(),
                logo: None,
            },
            flight_number: format!("{code}{}", 1000 + index),
            departure: SegmentEndpoint {
                airport: airport(&params.origin, "NYC"),
                time: rfc3339(departure),
                terminal: Some(departure_terminal),
                gate: None,
            },
            arrival: SegmentEndpoint {
                airport: airport(&params.destination, "LAX"),
                time: rfc3339(arrival),
                terminal: Some(arrival_terminal),
                gate: None,
            },
            duration,
            aircraft: Some("Boeing 737".to_string()),
        }],
        price: Price {
            amount: fare.floor() as u32,
            currency: "USD".to_string(),
            breakdown: Some(PriceBreakdown {
                base_fare: (fare * 0.8).floor() as u32,
                taxes: (fare * 0.15).floor() as u32,
                fees: (fare * 0.05).floor() as u32,
            }),
        },
        class: params.class,
        available_seats: rng.gen_range(10..60),
        total_duration: duration,
        stops: 0,
        baggage: Some(Baggage {
            carry: "1 carry-on bag".to_string(),
            checked: if params.class == CabinClass::Economy {
                "Not included"
            } else {
                "1 checked bag"
            }
            .to_string(),
        }),
    }
}

/// Generates 3 to 10 flights for `params`, sorted by price.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if the departure date is not `YYYY-MM-DD`.
pub fn mock_flight_search<R: Rng>(
    params: &SearchParams,
    rng: &mut R,
) -> Result<FlightSearchResponse> {
    let date = NaiveDate::parse_from_str(params.departure_date.trim(), "%Y-%m-%d").map_err(|_| {
        CoreError::Validation(vec![format!(
            "departureDate '{}' is not YYYY-MM-DD",
            params.departure_date
        )])
    })?;

    let count = rng.gen_range(3..=10);
    let flights = (0..count)
        .map(|index| mock_flight(params, date, index, rng))
        .collect();

    Ok(FlightSearchResponse::sorted(
        flights,
        format!("search_{}", Utc::now().timestamp_millis()),
        params.clone(),
    ))
}

/// Sleeps for the configured search latency plus a random share of the
/// jitter, standing in for a real booking backend.
pub async fn simulate_latency(pacing: &Pacing) {
    let jitter = pacing.search_jitter.mul_f64(rand::thread_rng().gen_range(0.0..1.0));
    let delay = pacing.search_latency + jitter;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Looks up a flight by id. Nothing is stored, so this never finds one.
#[must_use]
pub fn get_flight_by_id(id: &str) -> Option<Flight> {
    tracing::debug!(flight_id = %id, "flight lookup (no persistent storage)");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params() -> SearchParams {
        SearchParams::new("NYC", "LHR", "2025-07-20")
    }

    #[test]
    fn results_are_sorted_and_counted() {
        let mut rng = StdRng::seed_from_u64(42);
        let response = mock_flight_search(&params(), &mut rng).expect("valid date");

        assert!((3..=10).contains(&response.flights.len()));
        assert_eq!(response.total_results, response.flights.len());
        assert!(response.search_id.starts_with("search_"));
        assert!(response
            .flights
            .windows(2)
            .all(|pair| pair[0].price.amount <= pair[1].price.amount));
    }

    #[test]
    fn segments_carry_airports_and_times() {
        let mut rng = StdRng::seed_from_u64(7);
        let response = mock_flight_search(&params(), &mut rng).expect("valid date");
        let first = response
            .flights
            .iter()
            .find(|f| f.id == "flight_1")
            .expect("flight_1 present");
        let segment = &first.segments[0];

        assert_eq!(segment.id, "segment_1");
        assert_eq!(segment.flight_number, "AA1000");
        assert_eq!(segment.departure.airport.name, "John F. Kennedy International Airport");
        assert_eq!(segment.arrival.airport.country, "UK");
        assert!(segment.departure.time.starts_with("2025-07-20T06:"));
        assert!(segment.departure.time.ends_with('Z'));
        assert_eq!(first.total_duration, segment.duration);
        assert_eq!(first.baggage.as_ref().map(|b| b.checked.as_str()), Some("Not included"));
    }

    #[test]
    fn unknown_airports_fall_back() {
        let mut rng = StdRng::seed_from_u64(1);
        let response =
            mock_flight_search(&SearchParams::new("ZZZ", "QQQ", "2025-07-20"), &mut rng).expect("valid");
        let segment = &response.flights[0].segments[0];
        assert_eq!(segment.departure.airport.code, "NYC");
        assert_eq!(segment.arrival.airport.code, "LAX");
    }

    #[test]
    fn bad_date_is_a_validation_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = mock_flight_search(&SearchParams::new("NYC", "LAX", "tomorrow"), &mut rng).unwrap_err();
        assert!(err.to_string().contains("departureDate"));
    }

    #[tokio::test]
    async fn no_pacing_means_no_latency() {
        let started = std::time::Instant::now();
        simulate_latency(&Pacing::none()).await;
        assert!(started.elapsed() < std::time::Duration::from_millis(50));
    }

    #[test]
    fn lookup_finds_nothing() {
        assert!(get_flight_by_id("flight_1").is_none());
    }

    proptest! {
        #[test]
        fn breakdown_never_exceeds_price(seed in any::<u64>(), class in 0usize..4) {
            let class = [
                CabinClass::Economy,
                CabinClass::PremiumEconomy,
                CabinClass::Business,
                CabinClass::First,
            ][class];
            let mut rng = StdRng::seed_from_u64(seed);
            let response = mock_flight_search(&params().with_class(class), &mut rng).expect("valid date");
            for flight in response.flights {
                let b = flight.price.breakdown.expect("breakdown");
                prop_assert!(b.base_fare + b.taxes + b.fees <= flight.price.amount);
                prop_assert!((10..60).contains(&flight.available_seats));
            }
        }
    }
}

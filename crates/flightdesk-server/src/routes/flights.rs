//! REST flight search backed by the mock generator.

use super::{json_body, AppState};
use crate::error::ApiError;
use crate::search::{get_flight_by_id, mock_flight_search, simulate_latency};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use flightdesk_core::error::CoreError;
use flightdesk_core::flight::{Flight, FlightSearchResponse, SearchParams};
use rand::rngs::StdRng;
use rand::SeedableRng;

const MISSING_FIELDS: &str = "Missing required fields: origin, destination, departureDate";

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/search", post(search))
        .route("/:id", get(flight))
}

async fn search(
    State(state): State<AppState>,
    body: Result<Json<SearchParams>, JsonRejection>,
) -> Result<Json<FlightSearchResponse>, ApiError> {
    let params = json_body(body)?;
    if !params.missing_required().is_empty() {
        return Err(ApiError::Validation(MISSING_FIELDS.to_string()));
    }

    simulate_latency(&state.config().pacing).await;
    let response = mock_flight_search(&params, &mut StdRng::from_entropy()).map_err(|e| match e {
        CoreError::Validation(problems) => ApiError::Validation(problems.join("; ")),
        other => state.internal_error(other),
    })?;

    tracing::info!(
        origin = %params.origin,
        destination = %params.destination,
        results = response.total_results,
        search_id = %response.search_id,
        "flight search"
    );
    Ok(Json(response))
}

async fn flight(Path(id): Path<String>) -> Result<Json<Flight>, ApiError> {
    get_flight_by_id(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Flight not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{get, json, post};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn search_returns_sorted_flights() {
        let (status, body) = json(
            post(
                "/api/flights/search",
                &json!({"origin": "NYC", "destination": "LAX", "departureDate": "2025-07-20"}),
            )
            .await,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let flights = body["flights"].as_array().expect("flights array");
        assert_eq!(body["totalResults"], flights.len());
        assert!((3..=10).contains(&flights.len()));
        let prices: Vec<u64> = flights
            .iter()
            .map(|f| f["price"]["amount"].as_u64().expect("integer price"))
            .collect();
        assert!(prices.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(body["searchParams"]["origin"], "NYC");
    }

    #[tokio::test]
    async fn missing_origin_is_400() {
        let (status, body) = json(
            post(
                "/api/flights/search",
                &json!({"destination": "LAX", "departureDate": "2025-07-20"}),
            )
            .await,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required fields: origin, destination, departureDate");
    }

    #[tokio::test]
    async fn malformed_date_is_400() {
        let (status, body) = json(
            post(
                "/api/flights/search",
                &json!({"origin": "NYC", "destination": "LAX", "departureDate": "next week"}),
            )
            .await,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|e| e.contains("YYYY-MM-DD")));
    }

    #[tokio::test]
    async fn non_json_body_is_400() {
        let (status, body) = json(post("/api/flights/search", &json!("not an object")).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|e| e.starts_with("invalid request body")));
    }

    #[tokio::test]
    async fn lookup_is_always_404() {
        let (status, body) = json(get("/api/flights/FL-123").await).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Flight not found"}));
    }
}

//! The `flight-booking-workflow`: validate, search, format.
//!
//! Each step is a plain function over typed input and output so the relay
//! can report them one at a time as `STEP_STARTED` / `STEP_FINISHED`.

use crate::error::{AgentError, AgentResult};
use crate::search::mock_flight_search;
use flightdesk_core::flight::{Flight, FlightSearchResponse, SearchParams};
use flightdesk_core::JsonValue;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Id of the only registered workflow.
pub const FLIGHT_BOOKING_WORKFLOW: &str = "flight-booking-workflow";

/// A step of the booking workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    /// Check and normalise the search parameters.
    ValidateSearch,
    /// Run the mock search.
    SearchFlights,
    /// Sort and summarise.
    FormatResults,
}

impl WorkflowStep {
    /// All steps in order.
    pub const ALL: [WorkflowStep; 3] = [
        WorkflowStep::ValidateSearch,
        WorkflowStep::SearchFlights,
        WorkflowStep::FormatResults,
    ];

    /// Step id, used as `stepId`.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            WorkflowStep::ValidateSearch => "validate-search",
            WorkflowStep::SearchFlights => "search-flights",
            WorkflowStep::FormatResults => "format-results",
        }
    }

    /// Human description, used as `stepName`.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            WorkflowStep::ValidateSearch => "Validate and process flight search parameters",
            WorkflowStep::SearchFlights => "Search for available flights",
            WorkflowStep::FormatResults => "Format flight search results for presentation",
        }
    }
}

/// Output of [`WorkflowStep::ValidateSearch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedSearch {
    /// Parameters with upper-cased airport codes.
    pub search_params: SearchParams,
    /// Whether every check passed.
    pub is_valid: bool,
    /// What failed, if anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// Output of [`WorkflowStep::SearchFlights`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    /// Results when the search ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_results: Option<FlightSearchResponse>,
    /// Why it did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Output of [`WorkflowStep::FormatResults`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedResults {
    /// Whether flights were found.
    pub success: bool,
    /// Flights sorted by price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flights: Option<Vec<Flight>>,
    /// One-line summary.
    pub summary: String,
    /// Number of flights.
    pub total_results: usize,
    /// Search id from the search step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_id: Option<String>,
    /// Error carried over from an earlier step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final workflow value, sent as the `WORKFLOW_RESULT` custom event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutput {
    /// The formatted results.
    pub formatted_results: FormattedResults,
}

/// Step 1: basic checks and code normalisation.
#[must_use]
pub fn validate_search(input: &SearchParams) -> ValidatedSearch {
    let mut errors = Vec::new();
    if input.origin.trim().len() < 3 {
        errors.push("Valid origin airport code is required".to_string());
    }
    if input.destination.trim().len() < 3 {
        errors.push("Valid destination airport code is required".to_string());
    }
    if input.departure_date.trim().is_empty() {
        errors.push("Departure date is required".to_string());
    }
    if input.passengers.adults < 1 {
        errors.push("At least one adult passenger is required".to_string());
    }

    ValidatedSearch {
        search_params: SearchParams {
            origin: input.origin.trim().to_uppercase(),
            destination: input.destination.trim().to_uppercase(),
            ..input.clone()
        },
        is_valid: errors.is_empty(),
        errors: (!errors.is_empty()).then_some(errors),
    }
}

/// Step 2: run the mock search for valid parameters.
pub fn search_flights<R: Rng>(validated: &ValidatedSearch, rng: &mut R) -> SearchOutcome {
    if !validated.is_valid {
        return SearchOutcome {
            search_results: None,
            error: Some("Invalid search parameters".to_string()),
        };
    }
    match mock_flight_search(&validated.search_params, rng) {
        Ok(results) => SearchOutcome {
            search_results: Some(results),
            error: None,
        },
        Err(err) => SearchOutcome {
            search_results: None,
            error: Some(format!("Flight search failed: {err}")),
        },
    }
}

/// Step 3: sort by price and summarise.
#[must_use]
pub fn format_results(outcome: SearchOutcome) -> FormattedResults {
    let Some(results) = outcome.search_results.filter(|_| outcome.error.is_none()) else {
        return FormattedResults {
            success: false,
            flights: None,
            summary: outcome
                .error
                .clone()
                .unwrap_or_else(|| "No search results available".to_string()),
            total_results: 0,
            search_id: None,
            error: outcome.error,
        };
    };

    let mut flights = results.flights;
    flights.sort_by_key(|f| f.price.amount);
    let prices = flights.iter().map(|f| f.price.amount);
    let range = match (prices.clone().min(), prices.max()) {
        (Some(low), Some(high)) => format!("${low} - ${high}"),
        _ => "N/A".to_string(),
    };

    FormattedResults {
        success: true,
        summary: format!(
            "Found {} flights. Price range: {range}. Best value options are highlighted.",
            results.total_results
        ),
        total_results: results.total_results,
        search_id: Some(results.search_id),
        flights: Some(flights),
        error: None,
    }
}

/// Checks that `id` names a known workflow.
///
/// # Errors
///
/// Returns [`AgentError::Workflow`] for any other id.
pub fn lookup(id: &str) -> AgentResult<&'static str> {
    if id == FLIGHT_BOOKING_WORKFLOW {
        Ok(FLIGHT_BOOKING_WORKFLOW)
    } else {
        Err(AgentError::workflow(format!("Workflow '{id}' not found")))
    }
}

/// Decodes the workflow's `inputData`.
///
/// # Errors
///
/// Returns [`AgentError::Workflow`] if the value is not a search request.
pub fn decode_input(input: &JsonValue) -> AgentResult<SearchParams> {
    if !input.is_object() {
        return Err(AgentError::workflow(
            "Workflow execution failed: inputData must be an object",
        ));
    }
    serde_json::from_value(input.clone())
        .map_err(|e| AgentError::workflow(format!("Workflow execution failed: {e}")))
}

//! Axum integration: the SSE response body, [`ApiError`] as a response,
//! and [`RequestMetadata`] from request headers.
//!
//! ```rust,no_run
//! use flightdesk_server::integrations::axum::sse_response;
//! use flightdesk_core::event::Event;
//! use flightdesk_core::types::{RunId, ThreadId};
//! use futures::stream;
//!
//! let events = stream::iter(vec![
//!     Event::run_started(ThreadId::new("t"), RunId::new("r")),
//!     Event::run_finished(ThreadId::new("t"), RunId::new("r"), None),
//! ]);
//! let response = sse_response(events);
//! ```

use crate::agent::RequestMetadata;
use crate::encoder::EventEncoder;
use crate::error::ApiError;
use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use flightdesk_core::event::Event;
use futures::stream::{self, Stream, StreamExt};
use std::collections::HashMap;
use std::convert::Infallible;

/// Streams `events` as a `text/event-stream` response, one `data:` frame per
/// event. An event that fails to encode becomes a `RUN_ERROR` frame.
///
/// The body ends after the first terminal frame, whether the run sent it or
/// it replaced an event that failed to encode. Dropping `events` at that
/// point lets the producer see the client is gone.
pub fn sse_response<St>(events: St) -> Response
where
    St: Stream<Item = Event> + Send + 'static,
{
    let encoder = EventEncoder::sse();
    let content_type = HeaderValue::from_static(encoder.content_type());
    let frames = stream::unfold(
        (events.boxed(), encoder, false),
        |(mut events, encoder, ended)| async move {
            if ended {
                return None;
            }
            let event = events.next().await?;
            let (frame, ended) = match encoder.encode_or_error(&event) {
                Ok(frame) => (frame, event.is_terminal()),
                Err(run_error) => (run_error, true),
            };
            Some((Ok::<_, Infallible>(frame), (events, encoder, ended)))
        },
    );

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, content_type),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (CONNECTION, HeaderValue::from_static("keep-alive")),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

impl RequestMetadata {
    /// Metadata from request headers. Headers that are not valid UTF-8 are
    /// skipped; a request id is generated when the client sent none.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let collected: HashMap<String, String> = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let metadata = Self::with_headers(collected);
        if metadata.request_id.is_some() {
            metadata
        } else {
            metadata.with_request_id(uuid::Uuid::new_v4().to_string())
        }
    }
}

//! Event encoding for the SSE response body.
//!
//! # Example
//!
//! ```rust
//! use flightdesk_server::encoder::EventEncoder;
//! use flightdesk_core::event::Event;
//! use flightdesk_core::types::{RunId, ThreadId};
//!
//! let encoder = EventEncoder::sse();
//! let event: Event = Event::run_started(ThreadId::new("thread-1"), RunId::new("run-1"));
//!
//! let bytes = encoder.encode(&event).expect("encoding failed");
//! assert!(bytes.starts_with(b"data: "));
//! assert!(bytes.ends_with(b"\n\n"));
//! ```

mod sse;

pub use sse::encode as encode_sse;

use crate::error::EncodeResult;
use bytes::Bytes;
use flightdesk_core::event::Event;
use flightdesk_core::AgentState;

/// MIME type of the event stream.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Event encoder used for every frame of one response.
#[derive(Debug, Clone, Default)]
pub struct EventEncoder {
    _private: (),
}

impl EventEncoder {
    /// Create an SSE encoder.
    #[must_use]
    pub const fn sse() -> Self {
        Self { _private: () }
    }

    /// Get the content type for response headers.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        EVENT_STREAM
    }

    /// Encode an event to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`](crate::error::EncodeError) if JSON
    /// serialization fails or the event exceeds the size limit.
    pub fn encode<S: AgentState>(&self, event: &Event<S>) -> EncodeResult<Bytes> {
        sse::encode(event)
    }

    /// Encode an event, degrading to a `RUN_ERROR` frame when it cannot be
    /// encoded. `Err` carries that replacement frame; it ends the run, so
    /// nothing may be written after it.
    ///
    /// # Errors
    ///
    /// The `RUN_ERROR` frame written in place of `event`.
    pub fn encode_or_error<S: AgentState>(&self, event: &Event<S>) -> Result<Bytes, Bytes> {
        sse::encode(event).map_err(|err| {
            tracing::error!(event_type = %event.event_type(), error = %err, "failed to encode event");
            let error_event: Event<S> =
                Event::run_error(format!("encoding error: {err}"), Some("ENCODING_ERROR".into()));
            sse::encode(&error_event)
                .unwrap_or_else(|_| Bytes::from_static(sse::FALLBACK_RUN_ERROR.as_bytes()))
        })
    }

    /// Encode multiple events into one buffer.
    ///
    /// # Errors
    ///
    /// Returns the first encoding error encountered.
    pub fn encode_batch<S: AgentState>(&self, events: &[Event<S>]) -> EncodeResult<Bytes> {
        let mut buffer = Vec::with_capacity(events.len() * 256);
        for event in events {
            buffer.extend_from_slice(&sse::encode(event)?);
        }
        Ok(Bytes::from(buffer))
    }
}

//! `data: <json>\n\n` framing for run events.

use crate::error::{EncodeError, EncodeResult};
use bytes::{BufMut, Bytes, BytesMut};
use flightdesk_core::event::Event;
use flightdesk_core::AgentState;

/// Largest JSON payload a single frame may carry.
const FRAME_LIMIT: usize = 1 << 20;

const PREFIX: &[u8] = b"data: ";
const TERMINATOR: &[u8] = b"\n\n";

/// Written when even the `RUN_ERROR` replacing a failed event cannot be encoded.
pub(crate) const FALLBACK_RUN_ERROR: &str =
    "data: {\"type\":\"RUN_ERROR\",\"message\":\"encoding failed\",\"code\":\"ENCODING_ERROR\"}\n\n";

/// Serializes `event` into one SSE frame.
///
/// JSON strings never contain a raw line break, so the payload always fits
/// on a single `data:` line.
///
/// # Errors
///
/// [`EncodeError::Json`] if serialization fails, [`EncodeError::EventTooLarge`]
/// if the payload is over the frame limit.
pub fn encode<S: AgentState>(event: &Event<S>) -> EncodeResult<Bytes> {
    let payload = serde_json::to_vec(event)
        .map_err(|e| EncodeError::json(event.event_type().as_str(), e))?;
    if payload.len() > FRAME_LIMIT {
        return Err(EncodeError::EventTooLarge {
            size: payload.len(),
            max: FRAME_LIMIT,
        });
    }

    let mut frame = BytesMut::with_capacity(PREFIX.len() + payload.len() + TERMINATOR.len());
    frame.put_slice(PREFIX);
    frame.put_slice(&payload);
    frame.put_slice(TERMINATOR);
    Ok(frame.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightdesk_core::types::{MessageId, RunId, ThreadId};
    use serde_json::json;

    fn text(bytes: &Bytes) -> &str {
        std::str::from_utf8(bytes).unwrap()
    }

    #[test]
    fn run_started_frame() {
        let event: Event = Event::run_started(ThreadId::new("1721462400000"), RunId::new("run-1"));
        let frame = encode(&event).unwrap();
        assert!(text(&frame).starts_with("data: {\"type\":\"RUN_STARTED\""));
        assert!(text(&frame).ends_with("}\n\n"));

        let payload: serde_json::Value =
            serde_json::from_str(text(&frame).trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(payload["threadId"], "1721462400000");
        assert_eq!(payload["runId"], "run-1");
    }

    #[test]
    fn workflow_text_with_line_breaks_stays_on_one_line() {
        let event: Event =
            Event::text_message_content(MessageId::new("msg-1"), "✅ validate-search\n\n").unwrap();
        let frame = encode(&event).unwrap();
        assert_eq!(text(&frame).trim_end().lines().count(), 1);
        assert!(text(&frame).contains("✅ validate-search\\n\\n"));
    }

    #[test]
    fn oversized_search_result_is_refused() {
        let event: Event = Event::custom("FLIGHT_SEARCH_RESULT", json!({"blob": "x".repeat(FRAME_LIMIT)}));
        assert!(matches!(
            encode(&event),
            Err(EncodeError::EventTooLarge { max: FRAME_LIMIT, .. })
        ));
    }

    #[test]
    fn fallback_frame_parses_as_run_error() {
        let payload = FALLBACK_RUN_ERROR.strip_prefix("data: ").unwrap().trim_end();
        let event: Event = serde_json::from_str(payload).unwrap();
        assert!(event.is_terminal());
    }
}

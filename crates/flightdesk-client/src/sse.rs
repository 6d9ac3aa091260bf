//! Decoding of `text/event-stream` bodies into [`Event`]s.
//!
//! Framing is left to `eventsource-stream`; this module only turns each
//! frame's `data` into an [`Event`]. Frames cut off by the end of the body
//! are dropped, as an `EventSource` would.

use crate::error::ClientError;
use bytes::Bytes;
use eventsource_stream::{Event as Frame, EventStreamError, Eventsource};
use flightdesk_core::event::Event;
use futures::future;
use futures::stream::{BoxStream, Stream, StreamExt};

/// Decodes an SSE body into events.
pub fn decode<'a, St, E>(body: St) -> BoxStream<'a, Result<Event, ClientError>>
where
    St: Stream<Item = Result<Bytes, E>> + Send + 'a,
    E: Into<ClientError> + Send + 'a,
{
    body.eventsource()
        .filter_map(|frame| future::ready(decode_frame(frame)))
        .boxed()
}

fn decode_frame<E: Into<ClientError>>(
    frame: Result<Frame, EventStreamError<E>>,
) -> Option<Result<Event, ClientError>> {
    let frame = match frame {
        Ok(frame) => frame,
        Err(EventStreamError::Transport(e)) => return Some(Err(e.into())),
        Err(EventStreamError::Utf8(e)) => {
            return Some(Err(ClientError::Stream {
                message: format!("body is not UTF-8: {e}"),
            }));
        }
        Err(EventStreamError::Parser(e)) => {
            return Some(Err(ClientError::Stream {
                message: e.to_string(),
            }));
        }
    };

    if frame.data.trim().is_empty() {
        log::trace!("skipping '{}' frame without data", frame.event);
        return None;
    }
    let decoded = serde_json::from_str::<Event>(&frame.data);
    Some(decoded.map_err(|source| ClientError::Decode {
        source,
        frame: frame.data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightdesk_core::event::EventType;
    use futures::stream;

    const STARTED: &str = r#"data: {"type":"RUN_STARTED","threadId":"t","runId":"r"}"#;
    const FINISHED: &str = r#"data: {"type":"RUN_FINISHED","threadId":"t","runId":"r"}"#;

    async fn decode_chunks(chunks: Vec<&[u8]>) -> Vec<Result<Event, ClientError>> {
        let body = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, ClientError>(Bytes::copy_from_slice(c))),
        );
        decode(body).collect().await
    }

    #[tokio::test]
    async fn decodes_across_chunk_boundaries() {
        let body = format!("{STARTED}\n\n{FINISHED}\n\n");
        let (head, tail) = body.as_bytes().split_at(17);

        let types: Vec<EventType> = decode_chunks(vec![head, tail])
            .await
            .into_iter()
            .map(|e| e.unwrap().event_type())
            .collect();
        assert_eq!(types, [EventType::RunStarted, EventType::RunFinished]);
    }

    #[tokio::test]
    async fn split_utf8_is_reassembled() {
        let body = "data: {\"type\":\"TEXT_MESSAGE_CONTENT\",\"messageId\":\"m\",\"delta\":\"✈️ go\"}\n\n";
        let cut = body.find('✈').unwrap() + 1;

        let events = decode_chunks(vec![&body.as_bytes()[..cut], &body.as_bytes()[cut..]]).await;
        match &events[..] {
            [Ok(Event::TextMessageContent(e))] => assert_eq!(e.delta, "✈️ go"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn comments_and_other_fields_are_ignored() {
        let body = format!(": keep-alive\n\nevent: run\nid: 1\r\n{STARTED}\r\n\r\n");
        let events = decode_chunks(vec![body.as_bytes()]).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Ok(Event::RunStarted(_))));
    }

    #[tokio::test]
    async fn multi_line_data_is_joined() {
        let body = "data: {\"type\":\"RUN_STARTED\",\ndata: \"threadId\":\"t\",\"runId\":\"r\"}\n\n";
        let events = decode_chunks(vec![body.as_bytes()]).await;
        assert!(matches!(events[0], Ok(Event::RunStarted(_))));
    }

    #[tokio::test]
    async fn bad_json_is_a_decode_error() {
        let events = decode_chunks(vec![&b"data: {\"type\":\"NOPE\"}\n\n"[..]]).await;
        assert!(matches!(events[0], Err(ClientError::Decode { ref frame, .. }) if frame.contains("NOPE")));
    }

    #[tokio::test]
    async fn unterminated_trailing_frame_is_dropped() {
        let body = format!("{STARTED}\n\n{FINISHED}");
        let events = decode_chunks(vec![body.as_bytes()]).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Ok(Event::RunStarted(_))));
    }

    #[tokio::test]
    async fn transport_errors_pass_through() {
        let chunks: Vec<Result<Bytes, ClientError>> = vec![
            Ok(Bytes::from(format!("{STARTED}\n\n"))),
            Err(ClientError::protocol("connection reset")),
        ];
        let events: Vec<_> = decode(stream::iter(chunks)).collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Err(ClientError::Protocol { ref message }) if message == "connection reset"));
    }
}

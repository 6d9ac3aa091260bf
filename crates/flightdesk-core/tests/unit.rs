#[cfg(test)]
mod tests {
    use flightdesk_core::CoreError;
    use flightdesk_core::event::{Event, EventType};
    use flightdesk_core::flight::{CabinClass, SearchParams, TripType};
    use flightdesk_core::types::{MessageId, RunId, ThreadId};
    use serde_json::json;

    #[test]
    fn test_browser_search_body_deserializes() {
        let params: SearchParams = serde_json::from_value(json!({
            "origin": "NYC",
            "destination": "LAX",
            "departureDate": "2025-07-20",
            "returnDate": "2025-07-27",
            "passengers": {"adults": 2, "children": 1},
            "class": "premium-economy",
            "tripType": "round-trip"
        }))
        .unwrap();

        assert_eq!(params.passengers.total(), 3);
        assert_eq!(params.class, CabinClass::PremiumEconomy);
        assert_eq!(params.trip_type, TripType::RoundTrip);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_partial_body_reports_missing_fields() {
        let params: SearchParams = serde_json::from_value(json!({"origin": "NYC"})).unwrap();
        assert_eq!(params.missing_required(), ["destination", "departureDate"]);
        assert_eq!(params.passengers.adults, 1);
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let params = SearchParams::new("NYC", "", "20-07-2025").with_return("2025-07-01");
        match params.validate() {
            Err(CoreError::Validation(problems)) => {
                assert_eq!(problems.len(), 2);
                assert_eq!(problems[0], "destination is required");
                assert!(problems[1].contains("not YYYY-MM-DD"));
            }
            other => panic!("expected validation problems, got {other:?}"),
        }
    }

    #[test]
    fn test_event_stream_wire_format() {
        let frames = [
            json!({"type": "RUN_STARTED", "threadId": "thread-1", "runId": "run-1", "timestamp": 1721462400000_i64}),
            json!({"type": "TEXT_MESSAGE_START", "messageId": "msg_1", "role": "assistant"}),
            json!({"type": "TEXT_MESSAGE_CONTENT", "messageId": "msg_1", "delta": "Searching flights"}),
            json!({"type": "CUSTOM", "name": "FLIGHT_SEARCH_RESULT", "value": {"totalResults": 6}}),
            json!({"type": "STATE_SNAPSHOT", "state": {"currentStep": "completed"}}),
            json!({"type": "TEXT_MESSAGE_END", "messageId": "msg_1"}),
            json!({"type": "RUN_FINISHED", "threadId": "thread-1", "runId": "run-1", "result": {"success": true}}),
        ];

        let events: Vec<Event> = frames
            .iter()
            .map(|frame| serde_json::from_value(frame.clone()).unwrap())
            .collect();
        let types: Vec<EventType> = events.iter().map(Event::event_type).collect();
        assert_eq!(
            types,
            [
                EventType::RunStarted,
                EventType::TextMessageStart,
                EventType::TextMessageContent,
                EventType::Custom,
                EventType::StateSnapshot,
                EventType::TextMessageEnd,
                EventType::RunFinished,
            ]
        );
        assert_eq!(events[0].timestamp(), Some(1_721_462_400_000));
        assert!(events.last().unwrap().is_terminal());
        assert_eq!(serde_json::to_value(&events[3]).unwrap(), frames[3]);
    }

    #[test]
    fn test_client_chosen_ids_are_kept_verbatim() {
        let event: Event = Event::run_finished(ThreadId::new("1721462400000"), RunId::new("run 7"), None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["threadId"], "1721462400000");
        assert_eq!(json["runId"], "run 7");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_empty_content_delta_is_rejected() {
        assert!(Event::<serde_json::Value>::text_message_content(MessageId::random(), "").is_err());
        assert!(Event::<serde_json::Value>::text_message_content(MessageId::random(), "hi").is_ok());
    }
}

//! Inbound frame handling: decode, apply, and build the error reply if any.

use relay_core::{ConnectionId, FrameError};
use tracing::warn;

use crate::protocol;
use crate::relay::{EventOutcome, Relay};

/// Handle one inbound text frame from connection `id`.
///
/// Returns `Err` with a serialized error frame when the frame was rejected;
/// that reply goes back to the sender only.
pub fn handle_text(relay: &Relay, id: &ConnectionId, text: &str) -> Result<EventOutcome, String> {
    match protocol::decode_frame(text) {
        Ok(event) => Ok(relay.handle_event(id, event)),
        Err(err) => Err(reject(relay, id, &err)),
    }
}

/// Record a rejected frame and build the error acknowledgement.
pub fn reject(relay: &Relay, id: &ConnectionId, err: &FrameError) -> String {
    warn!(conn_id = %id, code = err.code(), error = %err, "rejected inbound frame");
    relay
        .metrics()
        .counter_inc("relay_frames_rejected", &[("code", err.code())], 1);
    protocol::encode_error(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use relay_core::{Channel, GroupId, UserId};
    use relay_telemetry::MetricsRecorder;

    use crate::outbox::Outbox;
    use crate::protocol::ErrorFrame;
    use crate::registry::JoinOutcome;

    fn relay() -> Relay {
        Relay::new(Arc::new(MetricsRecorder::new()))
    }

    #[test]
    fn join_frame_joins() {
        let relay = relay();
        let id = relay.connect(None, Outbox::channel(4).0);
        let outcome = handle_text(&relay, &id, r#"{"type":"joinGroup","groupId":"g1"}"#).unwrap();
        assert_eq!(outcome, EventOutcome::Joined(JoinOutcome::Joined));
        assert_eq!(
            relay.registry().members_of(&Channel::Group(GroupId::from_raw("g1"))),
            vec![id]
        );
    }

    #[test]
    fn send_frame_dispatches() {
        let relay = relay();
        let (outbox, mut rx) = Outbox::channel(4);
        let a = relay.connect(Some(UserId::from_raw("1")), Outbox::channel(4).0);
        relay.connect(Some(UserId::from_raw("2")), outbox);

        let text = r#"{"type":"sendDirectMessage","recipientId":2,"payload":{"content":"hi"}}"#;
        let outcome = handle_text(&relay, &a, text).unwrap();
        assert!(matches!(outcome, EventOutcome::Dispatched(r) if r.delivered == 1));
        assert_eq!(
            &*rx.try_recv().unwrap(),
            r#"{"type":"newDirectMessage","payload":{"content":"hi"}}"#
        );
    }

    #[test]
    fn malformed_frame_gets_error_reply_and_no_dispatch() {
        let relay = relay();
        let (outbox, mut rx) = Outbox::channel(4);
        let a = relay.connect(Some(UserId::from_raw("1")), outbox);

        let reply = handle_text(&relay, &a, r#"{"type":"sendDirectMessage","payload":"hi"}"#)
            .unwrap_err();
        let frame: ErrorFrame = serde_json::from_str(&reply).unwrap();
        assert_eq!(frame.code, "INVALID_PARAMS");
        assert!(rx.try_recv().is_err());
        assert_eq!(
            relay
                .metrics()
                .counter("relay_frames_rejected", &[("code", "INVALID_PARAMS")]),
            1
        );
        assert_eq!(relay.metrics().counter("relay_dispatches", &[("kind", "identity")]), 0);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let relay = relay();
        let a = relay.connect(None, Outbox::channel(4).0);
        let reply = handle_text(&relay, &a, "hello?").unwrap_err();
        let frame: ErrorFrame = serde_json::from_str(&reply).unwrap();
        assert_eq!(frame.kind, "error");
        assert_eq!(frame.code, "PARSE_ERROR");
    }
}

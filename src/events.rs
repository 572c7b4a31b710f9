//! Raw switch events relayed into the session mailbox.
//!
//! The event producer demultiplexes the switch's event firehose by call id
//! and forwards the raw JSON of anything addressed to a session. This
//! module turns those objects into the typed [`SwitchEvent`] set the
//! session acts on. Events that are malformed, or of a kind the session
//! has no interest in, parse to `None` and are dropped at the door.

use serde_json::{Map, Value};

use crate::types::{CallId, EventUuid, FetchId, NodeId};

const EVENT_NAME: &str = "Event-Name";
const APPLICATION: &str = "Application";
const APPLICATION_NAME: &str = "Application-Name";
const APPLICATION_UUID: &str = "Application-UUID";
const REPLACED_BY: &str = "Replaced-By";
const FETCH_ID: &str = "Fetch-ID";
const RESIGNING_UUID: &str = "Resigning-UUID";
const ACQUIRED_UUID: &str = "Acquired-UUID";
const MEDIA_NODE: &str = "Media-Node";
const OTHER_LEG_CALL_ID: &str = "Other-Leg-Call-ID";
const INTERCEPTED_BY: &str = "Intercepted-By";

/// Call lifecycle and execution events a control session reacts to.
#[derive(Debug, Clone)]
pub enum SwitchEvent {
    /// A dialplan application finished on the switch.
    ExecuteComplete {
        application: String,
        event_uuid: EventUuid,
        body: Map<String, Value>,
    },
    /// The channel is gone.
    Destroyed,
    /// Another channel took this call over; carries the surviving call id.
    Replaced {
        replaced_by: CallId,
        fetch_id: Option<FetchId>,
    },
    /// This leg lost a transfer.
    Transferee { fetch_id: Option<FetchId> },
    /// This leg initiated a transfer; the other leg stays interesting.
    Transferor { other_leg: Option<CallId> },
    /// The call was intercepted by another leg.
    Intercepted { intercepted_by: Option<CallId> },
    /// The switch started a redirect application on the channel.
    ExecuteRedirect,
    /// The switch collapsed a loopback and renamed the surviving leg.
    Bowout {
        resigning: CallId,
        acquired: CallId,
    },
    /// Another session announced control over this call.
    UsurpControl { fetch_id: FetchId },
    /// A media node dropped off.
    NodeDown { node: NodeId },
    /// A media node came back.
    NodeUp { node: NodeId },
}

impl SwitchEvent {
    /// Parse one raw event object.
    ///
    /// Execute-complete events missing either the application name or the
    /// correlation uuid are treated as malformed and dropped here, before
    /// they reach correlation.
    pub fn parse(event: &Map<String, Value>) -> Option<SwitchEvent> {
        let name = event.get(EVENT_NAME).and_then(Value::as_str)?;
        match name {
            "CHANNEL_EXECUTE_COMPLETE" => {
                let application = string_field(event, APPLICATION_NAME)?;
                let event_uuid = string_field(event, APPLICATION_UUID)?;
                Some(SwitchEvent::ExecuteComplete {
                    application,
                    event_uuid: EventUuid(event_uuid),
                    body: event.clone(),
                })
            }
            "CHANNEL_DESTROY" => Some(SwitchEvent::Destroyed),
            "CHANNEL_REPLACED" => Some(SwitchEvent::Replaced {
                replaced_by: CallId(string_field(event, REPLACED_BY)?),
                fetch_id: string_field(event, FETCH_ID).map(FetchId),
            }),
            "CHANNEL_TRANSFEREE" => Some(SwitchEvent::Transferee {
                fetch_id: string_field(event, FETCH_ID).map(FetchId),
            }),
            "CHANNEL_TRANSFEROR" => Some(SwitchEvent::Transferor {
                other_leg: string_field(event, OTHER_LEG_CALL_ID).map(CallId),
            }),
            "CHANNEL_INTERCEPTED" => Some(SwitchEvent::Intercepted {
                intercepted_by: string_field(event, INTERCEPTED_BY).map(CallId),
            }),
            // Only a redirect is interesting here; ordinary execute events
            // are noise at this layer.
            "CHANNEL_EXECUTE" => match event.get(APPLICATION).and_then(Value::as_str) {
                Some("redirect") => Some(SwitchEvent::ExecuteRedirect),
                _ => None,
            },
            "loopback::bowout" => Some(SwitchEvent::Bowout {
                resigning: CallId(string_field(event, RESIGNING_UUID)?),
                acquired: CallId(string_field(event, ACQUIRED_UUID)?),
            }),
            "usurp_control" => Some(SwitchEvent::UsurpControl {
                fetch_id: FetchId(string_field(event, FETCH_ID)?),
            }),
            "fs_nodedown" => Some(SwitchEvent::NodeDown {
                node: NodeId(string_field(event, MEDIA_NODE)?),
            }),
            "fs_nodeup" => Some(SwitchEvent::NodeUp {
                node: NodeId(string_field(event, MEDIA_NODE)?),
            }),
            _ => None,
        }
    }
}

fn string_field(event: &Map<String, Value>, key: &str) -> Option<String> {
    event
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().expect("test event is an object").clone()
    }

    #[test]
    fn parses_execute_complete() {
        let event = obj(json!({
            "Event-Name": "CHANNEL_EXECUTE_COMPLETE",
            "Application-Name": "playback",
            "Application-UUID": "u1",
            "DTMF-Digit": "5"
        }));
        match SwitchEvent::parse(&event) {
            Some(SwitchEvent::ExecuteComplete {
                application,
                event_uuid,
                body,
            }) => {
                assert_eq!(application, "playback");
                assert_eq!(event_uuid, EventUuid::from("u1"));
                assert_eq!(body.get("DTMF-Digit"), Some(&json!("5")));
            }
            other => panic!("unexpected parse result: {other:?}"),
        }
    }

    #[test]
    fn execute_complete_without_uuid_is_malformed() {
        let event = obj(json!({
            "Event-Name": "CHANNEL_EXECUTE_COMPLETE",
            "Application-Name": "playback"
        }));
        assert!(SwitchEvent::parse(&event).is_none());

        let event = obj(json!({
            "Event-Name": "CHANNEL_EXECUTE_COMPLETE",
            "Application-UUID": "u1"
        }));
        assert!(SwitchEvent::parse(&event).is_none());
    }

    #[test]
    fn channel_execute_is_only_interesting_for_redirect() {
        let redirect = obj(json!({
            "Event-Name": "CHANNEL_EXECUTE",
            "Application": "redirect"
        }));
        assert!(matches!(
            SwitchEvent::parse(&redirect),
            Some(SwitchEvent::ExecuteRedirect)
        ));

        let playback = obj(json!({
            "Event-Name": "CHANNEL_EXECUTE",
            "Application": "playback"
        }));
        assert!(SwitchEvent::parse(&playback).is_none());
    }

    #[test]
    fn parses_bowout() {
        let event = obj(json!({
            "Event-Name": "loopback::bowout",
            "Resigning-UUID": "A",
            "Acquired-UUID": "B"
        }));
        match SwitchEvent::parse(&event) {
            Some(SwitchEvent::Bowout { resigning, acquired }) => {
                assert_eq!(resigning, CallId::from("A"));
                assert_eq!(acquired, CallId::from("B"));
            }
            other => panic!("unexpected parse result: {other:?}"),
        }
    }

    #[test]
    fn unknown_events_are_dropped() {
        let event = obj(json!({"Event-Name": "CHANNEL_BRIDGE"}));
        assert!(SwitchEvent::parse(&event).is_none());
        assert!(SwitchEvent::parse(&obj(json!({}))).is_none());
    }
}

//! Execute-complete correlation.
//!
//! Decides whether an incoming execute-complete retires the in-flight
//! command. Only an event carrying the stored correlation token can
//! advance the queue; everything else is logged and ignored.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::command::FilterSpec;
use crate::session::ControlSession;
use crate::types::EventUuid;

impl ControlSession {
    pub(crate) async fn on_execute_complete(
        &mut self,
        raw_application: String,
        event_uuid: EventUuid,
        body: Map<String, Value>,
    ) {
        let Some(current_uuid) = self.current_cmd_uuid.clone() else {
            debug!(
                call_id = %self.call_id,
                application = %raw_application,
                "execute complete with nothing in flight, ignoring"
            );
            return;
        };
        if event_uuid != current_uuid {
            debug!(
                call_id = %self.call_id,
                application = %raw_application,
                %event_uuid,
                "execute complete from another command generation, ignoring"
            );
            return;
        }

        // A noop only counts when it answers the message we launched;
        // its Application-Response echoes the msg id it was sent with.
        if raw_application == "noop" {
            let response = body.get("Application-Response").and_then(Value::as_str);
            if response == self.msg_id.as_deref() {
                self.force_advance().await;
            } else {
                debug!(
                    call_id = %self.call_id,
                    ?response,
                    "noop answering a prior generation, ignoring"
                );
            }
            return;
        }

        let Some(current_app) = self.current_app.clone() else {
            warn!(
                call_id = %self.call_id,
                "correlation token held with no in-flight application"
            );
            return;
        };

        // One logical command can surface under several switch-level
        // application names; anything outside that set with our token is
        // a side effect of the running command, not its completion.
        let matched = raw_application == current_app
            || self
                .ctx
                .driver
                .switch_names(&current_app)
                .iter()
                .any(|name| *name == raw_application);
        if !matched {
            debug!(
                call_id = %self.call_id,
                %raw_application,
                %current_app,
                "side effect event during command execution, ignoring"
            );
            return;
        }

        if current_app == "playback" {
            self.flush_playback_group(&body);
        }
        self.force_advance().await;
    }

    /// The cooperative DTMF terminator contract: a playback interrupted
    /// by a digit takes the rest of its logical group with it.
    fn flush_playback_group(&mut self, body: &Map<String, Value>) {
        let Some(digit) = body.get("DTMF-Digit").and_then(Value::as_str) else {
            return;
        };
        let group = body.get("Group-ID").cloned().unwrap_or(Value::Null);
        let spec = FilterSpec::with_field("playback", "Group-ID", group);
        let dropped = self.command_q.filter(&[spec]);
        debug!(
            call_id = %self.call_id,
            digit,
            dropped,
            "playback interrupted by dtmf, dropped grouped playbacks"
        );
    }
}

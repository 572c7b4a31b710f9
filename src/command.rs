//! Dialplan command records.
//!
//! A [`Command`] is the canonical structured value extracted from one
//! `dialplan/command` (or `conference/command`) bus message. The session
//! only interprets the headers it needs for queueing and correlation; the
//! full decoded message is kept and forwarded opaquely to the switch
//! driver, which knows how to translate it into switch primitives.

use serde_json::{Map, Value};

use crate::types::{CallId, InsertAt};

const APPLICATION_NAME: &str = "Application-Name";
const MSG_ID: &str = "Msg-ID";
const INSERT_AT: &str = "Insert-At";
const CALL_ID: &str = "Call-ID";
const GROUP_ID: &str = "Group-ID";
const COMMANDS: &str = "Commands";

/// The application name of a batch super-command.
pub const QUEUE_APP: &str = "queue";

/// One dialplan command extracted from a bus message.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Logical application to run on the switch.
    pub application: String,
    /// Message id of the originating bus message, echoed back in
    /// completion and error reports.
    pub msg_id: Option<String>,
    /// Leg the command targets, when it is not the session's own leg.
    pub call_id: Option<CallId>,
    /// Cooperative early-termination group, used by the DTMF terminator
    /// contract on playback sequences.
    pub group_id: Option<String>,
    /// The full decoded message, forwarded to the switch driver.
    pub fields: Map<String, Value>,
}

impl Command {
    /// Build a command from a decoded bus message.
    ///
    /// Returns `None` when the message carries no usable
    /// `Application-Name`; such messages are dropped by ingestion.
    pub fn from_json(fields: &Map<String, Value>) -> Option<Command> {
        let application = fields
            .get(APPLICATION_NAME)
            .and_then(Value::as_str)
            .filter(|a| !a.is_empty())?
            .to_string();

        Some(Command {
            application,
            msg_id: string_field(fields, MSG_ID),
            call_id: string_field(fields, CALL_ID).map(CallId::from),
            group_id: string_field(fields, GROUP_ID),
            fields: fields.clone(),
        })
    }

    /// Whether this is a `queue` batch super-command.
    pub fn is_batch(&self) -> bool {
        self.application == QUEUE_APP
    }

    /// The original message echoed as the `Request` of an error report.
    pub fn as_request(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Explode a `queue` batch into its child commands, in order.
    ///
    /// Every child is merged over the batch's default headers, so a batch
    /// level `Msg-ID` or `Call-ID` applies to each child unless the child
    /// overrides it. Children without an application name are skipped, as
    /// are children whose application is itself `queue`.
    pub fn explode_batch(&self) -> Vec<Command> {
        let Some(children) = self.fields.get(COMMANDS).and_then(Value::as_array) else {
            return Vec::new();
        };

        let mut defaults = self.fields.clone();
        defaults.remove(COMMANDS);
        defaults.remove(APPLICATION_NAME);
        defaults.remove(INSERT_AT);

        children
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|child| {
                let mut merged = defaults.clone();
                for (key, value) in child {
                    merged.insert(key.clone(), value.clone());
                }
                Command::from_json(&merged)
            })
            .filter(|cmd| !cmd.is_batch())
            .collect()
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A command tagged with its queue insertion position.
///
/// The position is part of the command's identity on the wire, so it is
/// modeled as a sum rather than a loose string on the record.
#[derive(Debug, Clone, PartialEq)]
pub enum DialplanCommand {
    /// Execute immediately, bypassing the queue.
    Now(Command),
    /// Enqueue at the front.
    Head(Command),
    /// Enqueue at the end.
    Tail(Command),
    /// Break queued activity on the switch, drop the queue, then enqueue.
    Flush(Command),
}

impl DialplanCommand {
    /// Parse a decoded bus message into a tagged command.
    ///
    /// `Insert-At` defaults to `tail` when absent or unrecognized.
    pub fn parse(message: &Map<String, Value>) -> Option<DialplanCommand> {
        let command = Command::from_json(message)?;
        let insert_at = message
            .get(INSERT_AT)
            .and_then(Value::as_str)
            .map(InsertAt::parse)
            .unwrap_or_default();

        Some(match insert_at {
            InsertAt::Now => DialplanCommand::Now(command),
            InsertAt::Head => DialplanCommand::Head(command),
            InsertAt::Tail => DialplanCommand::Tail(command),
            InsertAt::Flush => DialplanCommand::Flush(command),
        })
    }

    pub fn insert_at(&self) -> InsertAt {
        match self {
            DialplanCommand::Now(_) => InsertAt::Now,
            DialplanCommand::Head(_) => InsertAt::Head,
            DialplanCommand::Tail(_) => InsertAt::Tail,
            DialplanCommand::Flush(_) => InsertAt::Flush,
        }
    }

    pub fn command(&self) -> &Command {
        match self {
            DialplanCommand::Now(c)
            | DialplanCommand::Head(c)
            | DialplanCommand::Tail(c)
            | DialplanCommand::Flush(c) => c,
        }
    }

    pub fn into_command(self) -> Command {
        match self {
            DialplanCommand::Now(c)
            | DialplanCommand::Head(c)
            | DialplanCommand::Tail(c)
            | DialplanCommand::Flush(c) => c,
        }
    }
}

/// One element of a filter-queue request.
///
/// A bare application name drops a leading streak of commands running that
/// application; the structured form additionally requires the listed
/// fields to match the candidate command.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    Application(String),
    WithFields {
        application: String,
        fields: Map<String, Value>,
    },
}

impl FilterSpec {
    /// Build a structured spec matching one application and field value.
    pub fn with_field(application: &str, key: &str, value: Value) -> FilterSpec {
        let mut fields = Map::new();
        fields.insert(key.to_string(), value);
        FilterSpec::WithFields {
            application: application.to_string(),
            fields,
        }
    }

    /// Parse one element of a `Filter-Applications` list.
    pub fn parse(value: &Value) -> Option<FilterSpec> {
        match value {
            Value::String(app) if !app.is_empty() => Some(FilterSpec::Application(app.clone())),
            Value::Object(obj) => {
                let application = obj
                    .get(APPLICATION_NAME)
                    .and_then(Value::as_str)
                    .filter(|a| !a.is_empty())?
                    .to_string();
                let mut fields = obj.clone();
                fields.remove(APPLICATION_NAME);
                Some(FilterSpec::WithFields { application, fields })
            }
            _ => None,
        }
    }

    /// Whether a queued command matches this spec.
    pub fn matches(&self, command: &Command) -> bool {
        match self {
            FilterSpec::Application(app) => command.application == *app,
            FilterSpec::WithFields { application, fields } => {
                command.application == *application
                    && fields.iter().all(|(key, want)| match want {
                        // A null requirement means the command must not
                        // carry the field at all.
                        Value::Null => command
                            .fields
                            .get(key)
                            .map(|v| v.is_null())
                            .unwrap_or(true),
                        want => command.fields.get(key) == Some(want),
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().expect("test message is an object").clone()
    }

    #[test]
    fn parse_defaults_to_tail() {
        let msg = obj(json!({"Application-Name": "playback", "File": "a.wav"}));
        let parsed = DialplanCommand::parse(&msg).expect("valid command");
        assert_eq!(parsed.insert_at(), InsertAt::Tail);
        assert_eq!(parsed.command().application, "playback");
    }

    #[test]
    fn parse_rejects_missing_application() {
        let msg = obj(json!({"Insert-At": "tail", "File": "a.wav"}));
        assert!(DialplanCommand::parse(&msg).is_none());

        let msg = obj(json!({"Application-Name": "", "Insert-At": "now"}));
        assert!(DialplanCommand::parse(&msg).is_none());
    }

    #[test]
    fn parse_hoists_headers() {
        let msg = obj(json!({
            "Application-Name": "playback",
            "Msg-ID": "m1",
            "Call-ID": "other-leg",
            "Group-ID": "g1",
            "File": "a.wav"
        }));
        let command = DialplanCommand::parse(&msg).unwrap().into_command();
        assert_eq!(command.msg_id.as_deref(), Some("m1"));
        assert_eq!(command.call_id, Some(CallId::from("other-leg")));
        assert_eq!(command.group_id.as_deref(), Some("g1"));
        assert_eq!(command.fields.get("File"), Some(&json!("a.wav")));
    }

    #[test]
    fn batch_explodes_in_order_with_merged_defaults() {
        let msg = obj(json!({
            "Application-Name": "queue",
            "Msg-ID": "batch-1",
            "Insert-At": "tail",
            "Commands": [
                {"Application-Name": "playback", "File": "a.wav"},
                {"Application-Name": "playback", "File": "b.wav", "Msg-ID": "own-id"},
                {"File": "no-app.wav"},
                {"Application-Name": "say", "Text": "hi"}
            ]
        }));
        let batch = Command::from_json(&msg).unwrap();
        assert!(batch.is_batch());

        let children = batch.explode_batch();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].application, "playback");
        assert_eq!(children[0].msg_id.as_deref(), Some("batch-1"));
        assert_eq!(children[1].msg_id.as_deref(), Some("own-id"));
        assert_eq!(children[2].application, "say");
        // Children must not inherit the batch position marker.
        assert!(children.iter().all(|c| !c.fields.contains_key("Insert-At")));
    }

    #[test]
    fn nested_batches_are_skipped() {
        let msg = obj(json!({
            "Application-Name": "queue",
            "Commands": [{"Application-Name": "queue", "Commands": []}]
        }));
        let batch = Command::from_json(&msg).unwrap();
        assert!(batch.explode_batch().is_empty());
    }

    #[test]
    fn filter_spec_matches_application_and_fields() {
        let cmd = Command::from_json(&obj(json!({
            "Application-Name": "playback",
            "Group-ID": "g1"
        })))
        .unwrap();

        assert!(FilterSpec::Application("playback".to_string()).matches(&cmd));
        assert!(!FilterSpec::Application("say".to_string()).matches(&cmd));
        assert!(FilterSpec::with_field("playback", "Group-ID", json!("g1")).matches(&cmd));
        assert!(!FilterSpec::with_field("playback", "Group-ID", json!("g2")).matches(&cmd));
    }

    #[test]
    fn filter_spec_null_requires_absent_field() {
        let ungrouped = Command::from_json(&obj(json!({"Application-Name": "playback"}))).unwrap();
        let grouped = Command::from_json(&obj(json!({
            "Application-Name": "playback",
            "Group-ID": "g1"
        })))
        .unwrap();

        let spec = FilterSpec::with_field("playback", "Group-ID", Value::Null);
        assert!(spec.matches(&ungrouped));
        assert!(!spec.matches(&grouped));
    }

    #[test]
    fn filter_spec_parses_both_shapes() {
        assert_eq!(
            FilterSpec::parse(&json!("playback")),
            Some(FilterSpec::Application("playback".to_string()))
        );
        let spec = FilterSpec::parse(&json!({"Application-Name": "playback", "Group-ID": "g1"}));
        assert!(matches!(spec, Some(FilterSpec::WithFields { .. })));
        assert!(FilterSpec::parse(&json!(42)).is_none());
    }
}

//! The per-call control session.
//!
//! One session is spawned for every live call the gateway wins control
//! of. It is a sequential actor: the bus consumer and the event producer
//! both feed a single mailbox, and all session state is owned by the
//! actor task. Externally a session is only reachable through its
//! [`SessionHandle`].
//!
//! The implementation is split by concern:
//! - `core`: actor state, spawn, the mailbox run loop and timers
//! - `ingest`: validation and queueing of incoming dialplan commands
//! - `advance`: the dispatch engine and error reporting
//! - `correlate`: execute-complete matching against the in-flight command
//! - `lifecycle`: call and node lifecycle transitions

mod advance;
mod core;
mod correlate;
mod ingest;
mod lifecycle;

pub use self::core::{CallSetup, ControlSession, SessionContext};

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::events::SwitchEvent;

/// Messages delivered to a session's mailbox.
#[derive(Debug)]
pub enum SessionMsg {
    /// A decoded `dialplan/command` or `conference/command` bus message.
    /// Both categories are handled identically.
    Dialplan(Value),
    /// A switch event relayed by the event producer.
    Event(SwitchEvent),
    /// External request to terminate immediately, without draining.
    Stop,
}

/// Cloneable address of a running control session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionMsg>,
}

impl SessionHandle {
    pub fn new(tx: mpsc::UnboundedSender<SessionMsg>) -> Self {
        Self { tx }
    }

    /// Deliver a dialplan command message. Returns false once the session
    /// has terminated.
    pub fn send_dialplan(&self, message: Value) -> bool {
        self.tx.send(SessionMsg::Dialplan(message)).is_ok()
    }

    /// Deliver a typed switch event.
    pub fn send_event(&self, event: SwitchEvent) -> bool {
        self.tx.send(SessionMsg::Event(event)).is_ok()
    }

    /// Parse and deliver a raw switch event object. Events the session
    /// has no interest in are dropped and reported as delivered.
    pub fn relay_raw(&self, event: &Map<String, Value>) -> bool {
        match SwitchEvent::parse(event) {
            Some(parsed) => self.send_event(parsed),
            None => !self.tx.is_closed(),
        }
    }

    /// Ask the session to terminate without draining its queue.
    pub fn stop(&self) {
        let _ = self.tx.send(SessionMsg::Stop);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Whether the actor loop keeps running after handling a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

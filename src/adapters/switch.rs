//! Interface to the media switch driver.

use async_trait::async_trait;
use thiserror::Error;

use crate::command::Command;
use crate::types::{CallId, EventUuid, NodeId};

/// Result type for switch driver calls
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Errors raised by the switch driver.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// The switch has no session for the targeted call id. Reported to
    /// the controller as "Session <id> not found".
    #[error("no session on the switch")]
    NoSession,

    /// No command module knows this application.
    #[error("unknown application: {0}")]
    UnknownApplication(String),

    /// Anything else the driver raised while translating or sending.
    #[error("switch error: {0}")]
    Switch(String),
}

/// Outcome of launching a command on the switch.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecStarted {
    /// Fire-and-forget command with no completion event to wait for.
    FireAndForget,
    /// The switch will emit an execute-complete carrying this token when
    /// the application finishes.
    Pending(EventUuid),
}

/// The subsystem translating logical dialplan commands into switch-native
/// primitives.
///
/// All calls are asynchronous at the protocol level: `exec_cmd` fires a
/// command and the completion, if any, comes back later through the event
/// producer as an execute-complete event.
#[async_trait]
pub trait SwitchDriver: Send + Sync {
    /// Fire a synthetic command at a channel without completion tracking.
    /// Used at session startup to stamp the channel with the control queue
    /// address.
    async fn cast_cmd(
        &self,
        node: &NodeId,
        call_id: &CallId,
        application: &str,
        args: &str,
    ) -> DriverResult<()>;

    /// Run a synchronous switch API call, e.g. `uuid_exists` or
    /// `uuid_break`, and return its textual reply.
    async fn api(&self, node: &NodeId, command: &str, args: &str) -> DriverResult<String>;

    /// Dispatch one dialplan command to its command module for execution
    /// against `target`. `reply_to` is the bus address completion events
    /// should be reported to.
    async fn exec_cmd(
        &self,
        node: &NodeId,
        target: &CallId,
        command: &Command,
        reply_to: &str,
    ) -> DriverResult<ExecStarted>;

    /// Switch-level application names a logical application may show up
    /// as in execute-complete events. One logical command can expand into
    /// several switch applications; the command-module registry owns that
    /// mapping and exposes it here for event correlation.
    fn switch_names(&self, application: &str) -> Vec<String>;
}

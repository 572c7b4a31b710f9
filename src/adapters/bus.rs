//! Interface to the upstream application bus.
//!
//! The session publishes four kinds of messages: the route-win reply that
//! hands the controller its control address, the usurp broadcast that
//! evicts any predecessor session, dialplan errors for failed commands,
//! and the execute-error call event for commands rejected while the media
//! node is down. Payloads are typed here and serialized with the bus's
//! dash-cased key convention.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::types::{CallId, FetchId, NodeId};

/// Microsecond UTC timestamp stamped on outbound bus events.
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// Reply telling the controller which session address owns the call.
#[derive(Debug, Clone, Serialize)]
pub struct RouteWin {
    #[serde(rename = "Call-ID")]
    pub call_id: CallId,
    #[serde(rename = "Control-Queue")]
    pub control_queue: String,
    #[serde(rename = "Control-PID")]
    pub control_pid: String,
    #[serde(rename = "Custom-Channel-Vars")]
    pub custom_channel_vars: Map<String, Value>,
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
}

/// Broadcast instructing any prior session for this call to bow out.
#[derive(Debug, Clone, Serialize)]
pub struct UsurpControl {
    #[serde(rename = "Call-ID")]
    pub call_id: CallId,
    #[serde(rename = "Fetch-ID")]
    pub fetch_id: FetchId,
    #[serde(rename = "Media-Node")]
    pub media_node: NodeId,
    #[serde(rename = "Reason")]
    pub reason: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
}

/// A `dialplan/error` event reporting one failed command.
#[derive(Debug, Clone, Serialize)]
pub struct DialplanError {
    #[serde(rename = "Call-ID")]
    pub call_id: CallId,
    #[serde(rename = "Msg-ID", skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    #[serde(rename = "Error-Message")]
    pub error_message: String,
    /// The original command echoed back to the originator.
    #[serde(rename = "Request")]
    pub request: Value,
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
}

/// A `CHANNEL_EXECUTE_ERROR` call event, published when an immediate
/// command is rejected because the media node is unreachable.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteError {
    #[serde(rename = "Event-Name")]
    pub event_name: String,
    #[serde(rename = "Call-ID")]
    pub call_id: CallId,
    #[serde(rename = "Application-Name")]
    pub application: String,
    #[serde(rename = "Msg-ID", skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    #[serde(rename = "Error-Message")]
    pub error_message: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
}

impl ExecuteError {
    pub fn new(call_id: CallId, application: &str, msg_id: Option<String>, message: &str) -> Self {
        Self {
            event_name: "CHANNEL_EXECUTE_ERROR".to_string(),
            call_id,
            application: application.to_string(),
            msg_id,
            error_message: message.to_string(),
            timestamp: now_us(),
        }
    }
}

/// Publisher side of the bus client.
///
/// Targeted publishes carry the destination queue and process token the
/// controller registered with; broadcast publishes fan out on the call
/// event exchange.
#[async_trait]
pub trait BusPublisher: Send + Sync {
    /// Send the route-win reply to the controller.
    async fn publish_route_win(&self, target_q: &str, target_p: &str, win: RouteWin)
        -> Result<()>;

    /// Broadcast a usurp notice for the call.
    async fn publish_usurp_control(&self, usurp: UsurpControl) -> Result<()>;

    /// Report a failed command back to the controller.
    async fn publish_dialplan_error(
        &self,
        target_q: &str,
        target_p: &str,
        error: DialplanError,
    ) -> Result<()>;

    /// Publish an execute-error call event.
    async fn publish_execute_error(&self, error: ExecuteError) -> Result<()>;
}

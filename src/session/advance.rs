//! The dispatch engine: execute one, wait, advance.

use tracing::{debug, error, warn};

use crate::adapters::bus::{now_us, DialplanError};
use crate::adapters::switch::{DriverError, ExecStarted};
use crate::command::Command;
use crate::session::ControlSession;
use crate::types::CallId;

impl ControlSession {
    /// The single progress function. Pulls from the queue and keeps the
    /// switch fed until a command is left in flight, the queue runs dry,
    /// or the node is unreachable.
    pub(crate) async fn advance(&mut self) {
        loop {
            if !self.is_node_up {
                self.clear_current();
                return;
            }
            let Some(command) = self.command_q.pop() else {
                self.clear_current();
                return;
            };
            if !self.is_call_up && !self.config.is_post_hangup_safe(&command.application) {
                debug!(
                    call_id = %self.call_id,
                    application = %command.application,
                    "rejecting command queued past hangup"
                );
                self.report_error(&command, None).await;
                continue;
            }

            let target = self.exec_target(&command);
            match self
                .ctx
                .driver
                .exec_cmd(&self.node, &target, &command, &self.control_q)
                .await
            {
                Ok(ExecStarted::FireAndForget) => continue,
                Ok(ExecStarted::Pending(event_uuid)) => {
                    debug!(
                        call_id = %self.call_id,
                        application = %command.application,
                        %event_uuid,
                        "command in flight"
                    );
                    self.msg_id = command.msg_id.clone();
                    self.current_app = Some(command.application.clone());
                    self.current_cmd_uuid = Some(event_uuid);
                    self.current_cmd = Some(command);
                    return;
                }
                Err(driver_error) => {
                    self.report_exec_failure(&command, driver_error).await;
                    continue;
                }
            }
        }
    }

    /// Abandon whatever is in flight and advance. Used when an outside
    /// event decided the in-flight command will never complete.
    pub(crate) async fn force_advance(&mut self) {
        self.clear_current();
        self.advance().await;
    }

    pub(crate) fn clear_current(&mut self) {
        self.current_app = None;
        self.current_cmd = None;
        self.current_cmd_uuid = None;
        self.msg_id = None;
    }

    /// The leg a command executes against: its own `Call-ID` when it
    /// names a known other leg of this call, our leg otherwise.
    pub(crate) fn exec_target(&self, command: &Command) -> CallId {
        match &command.call_id {
            Some(leg) if *leg != self.call_id && self.other_legs.contains(leg) => leg.clone(),
            _ => self.call_id.clone(),
        }
    }

    pub(crate) async fn report_exec_failure(&mut self, command: &Command, error: DriverError) {
        match error {
            DriverError::NoSession => {
                let message = format!(
                    "Session {} not found for {}",
                    self.call_id, command.application
                );
                self.report_error(command, Some(message)).await;
            }
            other => {
                error!(
                    call_id = %self.call_id,
                    application = %command.application,
                    error = %other,
                    "dialplan command failed on the switch"
                );
                self.report_error(command, None).await;
            }
        }
    }

    /// Publish a `dialplan/error` for one command back to the controller.
    /// A failed `hangup` is a terminal no-op and never errors.
    pub(crate) async fn report_error(&mut self, command: &Command, message: Option<String>) {
        if command.application == "hangup" {
            return;
        }
        let report = DialplanError {
            call_id: self.call_id.clone(),
            msg_id: command.msg_id.clone(),
            error_message: message.unwrap_or_else(|| {
                format!("Could not execute dialplan action: {}", command.application)
            }),
            request: command.as_request(),
            timestamp: now_us(),
        };
        if let Err(publish_error) = self
            .ctx
            .bus
            .publish_dialplan_error(&self.controller_q, &self.controller_p, report)
            .await
        {
            warn!(
                call_id = %self.call_id,
                %publish_error,
                "failed to publish dialplan error"
            );
        }
    }
}

//! Command ingestion: validation, batch explosion and queue insertion.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapters::bus::ExecuteError;
use crate::command::{Command, DialplanCommand, FilterSpec};
use crate::session::{ControlSession, Flow};

impl ControlSession {
    /// Handle one dialplan (or conference) command message from the bus.
    pub(crate) async fn handle_dialplan(&mut self, message: Value) -> Flow {
        let Some(fields) = message.as_object() else {
            warn!(call_id = %self.call_id, "dropping non-object dialplan message");
            return Flow::Continue;
        };
        let Some(parsed) = DialplanCommand::parse(fields) else {
            warn!(
                call_id = %self.call_id,
                "dropping dialplan message without an application name"
            );
            return Flow::Continue;
        };
        debug!(
            call_id = %self.call_id,
            application = %parsed.command().application,
            insert_at = ?parsed.insert_at(),
            "dialplan command received"
        );

        match parsed {
            DialplanCommand::Tail(command) => self.insert_tail(command),
            DialplanCommand::Head(command) => self.insert_head(command),
            DialplanCommand::Flush(command) => self.insert_flush(command).await,
            DialplanCommand::Now(command) => self.execute_now(command).await,
        }

        if !self.is_call_up {
            // Commands accepted past hangup buy another keep-alive window.
            self.reset_keep_alive();
        }
        if self.is_node_up && self.current_app.is_none() && !self.command_q.is_empty() {
            self.advance().await;
        }
        Flow::Continue
    }

    fn insert_tail(&mut self, command: Command) {
        if command.is_batch() {
            let children = command.explode_batch();
            debug!(
                call_id = %self.call_id,
                count = children.len(),
                "expanding command batch at the tail"
            );
            for child in children {
                self.command_q.push_tail(child);
            }
        } else {
            self.command_q.push_tail(command);
        }
    }

    fn insert_head(&mut self, command: Command) {
        if command.is_batch() {
            let children = command.explode_batch();
            debug!(
                call_id = %self.call_id,
                count = children.len(),
                "expanding command batch at the head"
            );
            // Reversed so the batch keeps its order at the front.
            for child in children.into_iter().rev() {
                self.command_q.push_head(child);
            }
        } else {
            self.command_q.push_head(command);
        }
    }

    /// Break everything running or queued on the switch for this call,
    /// drop the local queue, and start over with the new command.
    async fn insert_flush(&mut self, command: Command) {
        info!(
            call_id = %self.call_id,
            application = %command.application,
            "flushing queued call activity"
        );
        let args = format!("{} all", self.call_id);
        if let Err(error) = self.ctx.driver.api(&self.node, "uuid_break", &args).await {
            warn!(call_id = %self.call_id, %error, "uuid_break failed");
        }
        let dropped = self.command_q.flush();
        if dropped > 0 {
            debug!(call_id = %self.call_id, dropped, "dropped queued commands");
        }
        self.insert_tail(command);
        // Whatever was in flight was just broken on the switch; its
        // completion must not retire the new command.
        self.force_advance().await;
    }

    /// Run a command immediately, bypassing the queue. Its completion, if
    /// any, is not tracked; it may overlap the in-flight queued command.
    async fn execute_now(&mut self, command: Command) {
        if !self.is_node_up {
            warn!(
                call_id = %self.call_id,
                application = %command.application,
                "rejecting immediate command while the media node is down"
            );
            let error = ExecuteError::new(
                self.call_id.clone(),
                &command.application,
                command.msg_id.clone(),
                &format!("Node {} is not reachable", self.node),
            );
            if let Err(publish_error) = self.ctx.bus.publish_execute_error(error).await {
                warn!(call_id = %self.call_id, %publish_error, "failed to publish execute error");
            }
            return;
        }

        if command.application == "noop" {
            let specs: Vec<FilterSpec> = command
                .fields
                .get("Filter-Applications")
                .and_then(Value::as_array)
                .map(|list| list.iter().filter_map(FilterSpec::parse).collect())
                .unwrap_or_default();
            let dropped = self.command_q.filter(&specs);
            debug!(call_id = %self.call_id, dropped, "filtered command queue");
            return;
        }

        let target = self.exec_target(&command);
        match self
            .ctx
            .driver
            .exec_cmd(&self.node, &target, &command, &self.control_q)
            .await
        {
            Ok(_) => debug!(
                call_id = %self.call_id,
                application = %command.application,
                "immediate command dispatched"
            ),
            Err(error) => self.report_exec_failure(&command, error).await,
        }
    }
}

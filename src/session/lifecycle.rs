//! Call and node lifecycle transitions.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::SwitchEvent;
use crate::session::{ControlSession, Flow};
use crate::types::CallId;

impl ControlSession {
    pub(crate) async fn handle_event(&mut self, event: SwitchEvent) -> Flow {
        match event {
            SwitchEvent::ExecuteComplete {
                application,
                event_uuid,
                body,
            } => {
                self.on_execute_complete(application, event_uuid, body).await;
                Flow::Continue
            }
            SwitchEvent::Destroyed => {
                self.on_channel_destroyed().await;
                Flow::Continue
            }
            SwitchEvent::Replaced {
                replaced_by,
                fetch_id,
            } => {
                if fetch_id.as_ref() == Some(&self.fetch_id) {
                    info!(
                        call_id = %self.call_id,
                        new_call_id = %replaced_by,
                        "channel replaced"
                    );
                    self.rename_call_id(replaced_by).await;
                } else {
                    debug!(call_id = %self.call_id, "replacement for another fetch, ignoring");
                }
                Flow::Continue
            }
            SwitchEvent::Transferee { fetch_id } => {
                if fetch_id.as_ref() == Some(&self.fetch_id) {
                    info!(call_id = %self.call_id, "call transferred away, terminating");
                    Flow::Stop
                } else {
                    Flow::Continue
                }
            }
            SwitchEvent::Transferor { other_leg } => {
                if let Some(leg) = other_leg {
                    debug!(call_id = %self.call_id, other_leg = %leg, "tracking transfer leg");
                    self.other_legs.insert(leg);
                }
                Flow::Continue
            }
            SwitchEvent::Intercepted { intercepted_by } => {
                debug!(
                    call_id = %self.call_id,
                    ?intercepted_by,
                    "channel intercepted, interceptor's session takes over"
                );
                Flow::Continue
            }
            SwitchEvent::ExecuteRedirect => {
                info!(call_id = %self.call_id, "channel redirected, terminating");
                Flow::Stop
            }
            SwitchEvent::Bowout {
                resigning,
                acquired,
            } => {
                if resigning == self.call_id && acquired != resigning {
                    info!(
                        call_id = %resigning,
                        new_call_id = %acquired,
                        "loopback bowout, adopting surviving leg"
                    );
                    self.rename_call_id(acquired).await;
                }
                Flow::Continue
            }
            SwitchEvent::UsurpControl { fetch_id } => {
                if fetch_id != self.fetch_id {
                    info!(
                        call_id = %self.call_id,
                        "control usurped by another session, terminating"
                    );
                    Flow::Stop
                } else {
                    // Our own startup broadcast reflected back.
                    Flow::Continue
                }
            }
            SwitchEvent::NodeDown { node } => {
                if node == self.node {
                    self.on_node_down();
                }
                Flow::Continue
            }
            SwitchEvent::NodeUp { node } => {
                if node == self.node && !self.is_node_up {
                    self.on_node_up().await;
                }
                Flow::Continue
            }
        }
    }

    pub(crate) async fn on_channel_destroyed(&mut self) {
        if !self.is_call_up {
            // Duplicate destroy; restart the keep-alive window.
            self.reset_keep_alive();
            return;
        }
        info!(call_id = %self.call_id, "channel destroyed");
        self.is_call_up = false;
        if let Some(command) = self.current_cmd.take() {
            self.report_error(&command, None).await;
        }
        self.clear_current();
        // Drain: post-hangup safe commands still run, the rest error out.
        self.advance().await;
        self.reset_keep_alive();
    }

    fn on_node_down(&mut self) {
        if !self.is_node_up {
            return;
        }
        warn!(
            call_id = %self.call_id,
            node = %self.node,
            "media node down, holding the command queue"
        );
        self.is_node_up = false;
        self.node_down_deadline = Some(Instant::now() + self.config.max_node_restart_wait);
    }

    async fn on_node_up(&mut self) {
        self.node_down_deadline = None;
        self.is_node_up = true;

        // Spread the probes so a restarted node is not stampeded by every
        // session it hosts.
        let jitter = rand::thread_rng().gen_range(100..=1500);
        tokio::time::sleep(Duration::from_millis(jitter)).await;

        match self
            .ctx
            .driver
            .api(&self.node, "uuid_exists", self.call_id.as_str())
            .await
        {
            Ok(reply) if reply.trim() == "true" => {
                info!(
                    call_id = %self.call_id,
                    node = %self.node,
                    "media node restored, resuming"
                );
                self.force_advance().await;
            }
            Ok(_) => {
                info!(
                    call_id = %self.call_id,
                    "channel did not survive the node restart"
                );
                self.on_channel_destroyed().await;
            }
            Err(error) => {
                warn!(
                    call_id = %self.call_id,
                    %error,
                    "uuid_exists failed after node up, treating channel as destroyed"
                );
                self.on_channel_destroyed().await;
            }
        }
    }

    /// Adopt a new call id and move the registry entry with it, so events
    /// keyed on the new id keep landing in this mailbox.
    async fn rename_call_id(&mut self, new_id: CallId) {
        self.ctx.sessions.rename(&self.call_id, new_id.clone()).await;
        self.call_id = new_id;
    }
}

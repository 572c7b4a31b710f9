//! Session state, spawn and the mailbox run loop.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::adapters::bus::{now_us, BusPublisher, RouteWin, UsurpControl};
use crate::adapters::registry::{ChannelRegistry, SessionRegistry};
use crate::adapters::switch::SwitchDriver;
use crate::command::Command;
use crate::config::ControlConfig;
use crate::error::Result;
use crate::queue::CommandQueue;
use crate::session::{Flow, SessionHandle, SessionMsg};
use crate::types::{CallId, EventUuid, FetchId, NodeId};

/// Process-wide services a session talks to.
#[derive(Clone)]
pub struct SessionContext {
    pub driver: Arc<dyn SwitchDriver>,
    pub bus: Arc<dyn BusPublisher>,
    pub channels: Arc<dyn ChannelRegistry>,
    pub sessions: SessionRegistry,
}

/// Everything the routing layer hands a session at spawn time.
#[derive(Debug, Clone)]
pub struct CallSetup {
    /// Media switch node hosting the call.
    pub node: NodeId,
    /// Call id routing won control of.
    pub call_id: CallId,
    /// Routing decision id; survives call id renaming.
    pub fetch_id: FetchId,
    /// Bus address of the upstream controller.
    pub controller_q: String,
    /// Process token of the upstream controller.
    pub controller_p: String,
    /// Channel variables from routing, echoed back in the route-win.
    pub initial_ccvs: Map<String, Value>,
}

/// The per-call control session actor.
pub struct ControlSession {
    pub(crate) config: ControlConfig,
    pub(crate) ctx: SessionContext,

    pub(crate) node: NodeId,
    pub(crate) call_id: CallId,
    pub(crate) fetch_id: FetchId,
    pub(crate) control_q: String,
    pub(crate) control_p: String,
    pub(crate) controller_q: String,
    pub(crate) controller_p: String,
    pub(crate) initial_ccvs: Map<String, Value>,

    pub(crate) command_q: CommandQueue,
    pub(crate) current_app: Option<String>,
    pub(crate) current_cmd: Option<Command>,
    pub(crate) current_cmd_uuid: Option<EventUuid>,
    pub(crate) msg_id: Option<String>,
    pub(crate) other_legs: HashSet<CallId>,

    pub(crate) is_call_up: bool,
    pub(crate) is_node_up: bool,
    pub(crate) node_down_deadline: Option<Instant>,
    pub(crate) keep_alive_deadline: Option<Instant>,

    pub(crate) start_time: Instant,
}

impl ControlSession {
    /// Spawn the actor for one call and register it so the event producer
    /// can route this call's events (and bowout notices) to its mailbox.
    pub async fn spawn(
        config: ControlConfig,
        setup: CallSetup,
        ctx: SessionContext,
    ) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(tx);
        ctx.sessions
            .register(setup.call_id.clone(), handle.clone())
            .await;

        let token = Uuid::new_v4();
        let session = Self {
            control_q: format!("callctl.{}.{}", setup.node, token),
            control_p: format!("<{}>", token),
            config,
            ctx,
            node: setup.node,
            call_id: setup.call_id,
            fetch_id: setup.fetch_id,
            controller_q: setup.controller_q,
            controller_p: setup.controller_p,
            initial_ccvs: setup.initial_ccvs,
            command_q: CommandQueue::new(),
            current_app: None,
            current_cmd: None,
            current_cmd_uuid: None,
            msg_id: None,
            other_legs: HashSet::new(),
            is_call_up: true,
            is_node_up: true,
            node_down_deadline: None,
            keep_alive_deadline: None,
            start_time: Instant::now(),
        };
        tokio::spawn(session.run(rx));
        handle
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionMsg>) {
        let mut sanity = interval_at(
            Instant::now() + self.config.sanity_check_period,
            self.config.sanity_check_period,
        );
        sanity.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if let Err(err) = self.startup().await {
            error!(call_id = %self.call_id, error = %err, "control session startup failed");
            self.ctx.sessions.deregister(&self.call_id).await;
            return;
        }

        loop {
            let flow = tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(msg) => self.handle_msg(msg).await,
                    None => Flow::Stop,
                },
                _ = sanity.tick(), if self.is_call_up => self.on_sanity_check().await,
                _ = deadline(self.keep_alive_deadline), if self.keep_alive_deadline.is_some() => {
                    info!(call_id = %self.call_id, "post-hangup keep-alive expired");
                    Flow::Stop
                }
                _ = deadline(self.node_down_deadline), if self.node_down_deadline.is_some() =>
                    self.on_node_down_expired().await,
            };
            if flow == Flow::Stop {
                break;
            }
        }

        self.ctx.sessions.deregister(&self.call_id).await;
        info!(
            call_id = %self.call_id,
            node = %self.node,
            elapsed_ms = self.start_time.elapsed().as_millis() as u64,
            "control session terminated"
        );
    }

    /// Announce the session: stamp the channel with the control address,
    /// reply route-win to the controller, and broadcast a usurp so any
    /// predecessor bows out.
    async fn startup(&mut self) -> Result<()> {
        let stamp = format!(
            "^^|Channel-Control-Queue={}|Channel-Control-PID={}",
            self.control_q, self.control_p
        );
        self.ctx
            .driver
            .cast_cmd(&self.node, &self.call_id, "multiset", &stamp)
            .await?;

        let win = RouteWin {
            call_id: self.call_id.clone(),
            control_queue: self.control_q.clone(),
            control_pid: self.control_p.clone(),
            custom_channel_vars: self.initial_ccvs.clone(),
            timestamp: now_us(),
        };
        self.ctx
            .bus
            .publish_route_win(&self.controller_q, &self.controller_p, win)
            .await?;

        let usurp = UsurpControl {
            call_id: self.call_id.clone(),
            fetch_id: self.fetch_id.clone(),
            media_node: self.node.clone(),
            reason: "Route-Win".to_string(),
            timestamp: now_us(),
        };
        self.ctx.bus.publish_usurp_control(usurp).await?;

        info!(
            call_id = %self.call_id,
            node = %self.node,
            control_q = %self.control_q,
            "control session started"
        );
        Ok(())
    }

    async fn handle_msg(&mut self, msg: SessionMsg) -> Flow {
        match msg {
            SessionMsg::Dialplan(message) => self.handle_dialplan(message).await,
            SessionMsg::Event(event) => self.handle_event(event).await,
            SessionMsg::Stop => {
                info!(call_id = %self.call_id, "external stop");
                Flow::Stop
            }
        }
    }

    async fn on_sanity_check(&mut self) -> Flow {
        if self.ctx.channels.channel_exists(&self.call_id).await {
            debug!(call_id = %self.call_id, "sanity check passed");
        } else {
            info!(
                call_id = %self.call_id,
                "call id no longer registered, treating channel as destroyed"
            );
            self.on_channel_destroyed().await;
        }
        Flow::Continue
    }

    async fn on_node_down_expired(&mut self) -> Flow {
        self.node_down_deadline = None;
        info!(
            call_id = %self.call_id,
            node = %self.node,
            "media node did not return in time, treating channel as destroyed"
        );
        self.on_channel_destroyed().await;
        Flow::Continue
    }

    /// Arm (or rearm) the post-hangup keep-alive. Replacing the deadline
    /// cancels any previously armed expiry.
    pub(crate) fn reset_keep_alive(&mut self) {
        self.keep_alive_deadline = Some(Instant::now() + self.config.post_hangup_keep_alive);
    }
}

async fn deadline(at: Option<Instant>) {
    match at {
        Some(instant) => sleep_until(instant).await,
        None => std::future::pending::<()>().await,
    }
}

//! Per-call control session for a telephony media-control gateway.
//!
//! The gateway sits between a media switch, which terminates the actual
//! calls, and an upstream application bus delivering JSON dialplan
//! commands from call-flow logic. For each live call one control session
//! is spawned. It is the state machine that:
//!
//! 1. Serialises dialplan commands onto the media switch
//! 2. Correlates each command with the execute-complete event the switch
//!    emits when the application finishes
//! 3. Tracks call lifecycle: destroy, transfer, replacement, loopback
//!    bowout, node outage, usurp
//! 4. Bounds its own lifetime with sanity-check, node-down and
//!    post-hangup keep-alive timers
//!
//! The architecture consists of:
//! - Command queue: ordered pending commands with head/tail/now/flush
//!   insertion and prefix filtering
//! - Session actor: one mailbox-driven task per call, owning all state
//! - Adapters: trait seams to the switch driver, the bus publisher and
//!   the channel registry, so tests run against in-memory fakes
//!
//! At most one queued command is in flight at any time; an
//! execute-complete that does not carry the in-flight correlation token
//! cannot retire a command.

pub mod adapters;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod queue;
pub mod session;
pub mod types;

// Re-export the main types
pub use adapters::{
    BusPublisher, ChannelRegistry, DialplanError, DriverError, DriverResult, ExecStarted,
    ExecuteError, RouteWin, SessionRegistry, SwitchDriver, UsurpControl,
};
pub use command::{Command, DialplanCommand, FilterSpec};
pub use config::ControlConfig;
pub use error::{ControlError, Result};
pub use events::SwitchEvent;
pub use queue::CommandQueue;
pub use session::{CallSetup, ControlSession, SessionContext, SessionHandle, SessionMsg};
pub use types::{CallId, EventUuid, FetchId, InsertAt, NodeId};

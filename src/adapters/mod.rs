//! Seams to the session's external collaborators.
//!
//! The switch driver, the bus publisher and the channel registry are
//! process-wide services owned elsewhere in the gateway. The session only
//! ever sees them through the traits defined here, so tests substitute
//! in-memory fakes.

pub mod bus;
pub mod registry;
pub mod switch;

pub use bus::{BusPublisher, DialplanError, ExecuteError, RouteWin, UsurpControl};
pub use registry::{ChannelRegistry, SessionRegistry};
pub use switch::{DriverError, DriverResult, ExecStarted, SwitchDriver};

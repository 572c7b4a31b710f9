//! Control session configuration.
//!
//! One `ControlConfig` is shared by every session a gateway spawns. The
//! defaults mirror production behavior: a five minute sanity check, a ten
//! second grace window for a restarting media node, and a two second
//! post-hangup keep-alive.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// Timer periods and policy knobs for a control session.
///
/// # Examples
///
/// ```
/// use callctl::config::ControlConfig;
///
/// let mut config = ControlConfig::default();
/// config.post_hangup_keep_alive = std::time::Duration::from_secs(5);
/// config.validate().expect("configuration should be valid");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Period between checks that the call id still exists in the channel
    /// registry.
    pub sanity_check_period: Duration,

    /// How long to hold the command queue waiting for a down media node to
    /// come back before the call is treated as destroyed.
    pub max_node_restart_wait: Duration,

    /// How long a session lingers after hangup to accept and drain late
    /// commands before terminating.
    pub post_hangup_keep_alive: Duration,

    /// Application names that may still be executed on the switch once the
    /// channel is down. Anything else queued post-hangup is answered with a
    /// dialplan error.
    pub post_hangup_safe_apps: Vec<String>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            sanity_check_period: Duration::from_secs(300),
            max_node_restart_wait: Duration::from_secs(10),
            post_hangup_keep_alive: Duration::from_secs(2),
            post_hangup_safe_apps: vec!["hangup".to_string()],
        }
    }
}

impl ControlConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.sanity_check_period.is_zero() {
            return Err(ControlError::Configuration(
                "sanity_check_period must be non-zero".to_string(),
            ));
        }
        if self.max_node_restart_wait.is_zero() {
            return Err(ControlError::Configuration(
                "max_node_restart_wait must be non-zero".to_string(),
            ));
        }
        if self.post_hangup_keep_alive.is_zero() {
            return Err(ControlError::Configuration(
                "post_hangup_keep_alive must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether an application is allowed to run after the channel is gone.
    pub fn is_post_hangup_safe(&self, application: &str) -> bool {
        self.post_hangup_safe_apps.iter().any(|a| a == application)
    }
}

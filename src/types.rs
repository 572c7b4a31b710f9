//! Identifier types shared across the crate.
//!
//! Call, node and fetch identifiers are opaque strings handed to us by the
//! media switch and the routing layer. They are wrapped in newtypes so a
//! call id cannot be confused with a correlation token.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one call leg on the media switch.
///
/// A session starts out keyed by the call id routing selected, but the id
/// can be replaced while the session is alive (loopback bowout, channel
/// replacement). Always read it from the session, never cache it.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the media switch node hosting a call.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable identifier of the routing decision that created a session.
///
/// Survives call id renaming, which makes it the right discriminator for
/// transfer and usurp events.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct FetchId(pub String);

impl FetchId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FetchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FetchId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Correlation token returned by the switch when a command is launched.
///
/// Matched verbatim against the `Application-UUID` of incoming
/// execute-complete events. The content is opaque and never parsed.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct EventUuid(pub String);

impl EventUuid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventUuid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Queue insertion position carried by every dialplan command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertAt {
    /// Bypass the queue and execute immediately.
    Now,
    /// Enqueue at the front.
    Head,
    /// Enqueue at the end.
    Tail,
    /// Break all queued activity on the switch, then enqueue.
    Flush,
}

impl Default for InsertAt {
    fn default() -> Self {
        InsertAt::Tail
    }
}

impl InsertAt {
    /// Parse an `Insert-At` header value. Unknown values fall back to
    /// `tail`, the documented default.
    pub fn parse(value: &str) -> InsertAt {
        match value {
            "now" => InsertAt::Now,
            "head" => InsertAt::Head,
            "tail" => InsertAt::Tail,
            "flush" => InsertAt::Flush,
            _ => InsertAt::Tail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_at_defaults_to_tail() {
        assert_eq!(InsertAt::default(), InsertAt::Tail);
        assert_eq!(InsertAt::parse("bogus"), InsertAt::Tail);
        assert_eq!(InsertAt::parse("flush"), InsertAt::Flush);
        assert_eq!(InsertAt::parse("now"), InsertAt::Now);
    }
}

//! Channel and session registries.
//!
//! The channel registry is the gateway's view of which call ids are
//! currently live on the switch; the session uses it for its periodic
//! sanity check. The session registry is the process-wide map from call
//! id to session mailbox that the event producer routes raw events
//! through.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::session::SessionHandle;
use crate::types::CallId;

/// Lookup of whether a call id is currently live on the switch.
#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    async fn channel_exists(&self, call_id: &CallId) -> bool;
}

/// Map from call id to the session controlling that call.
///
/// Renaming under transfer or bowout must be atomic with respect to
/// lookups: a single write section moves the handle from the old id to
/// the new one, so an event arriving mid-rename either finds the old
/// entry or the new one, never neither.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<CallId, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a session under its call id. A session already registered
    /// under that id is displaced; the usurp broadcast at startup tells it
    /// to bow out.
    pub async fn register(&self, call_id: CallId, handle: SessionHandle) {
        let displaced = self.inner.write().await.insert(call_id.clone(), handle);
        if displaced.is_some() {
            debug!(%call_id, "displaced a prior session registration");
        }
    }

    /// Find the session controlling a call id.
    pub async fn lookup(&self, call_id: &CallId) -> Option<SessionHandle> {
        self.inner.read().await.get(call_id).cloned()
    }

    /// Atomically move a registration from one call id to another.
    ///
    /// Returns false when nothing was registered under `from`.
    pub async fn rename(&self, from: &CallId, to: CallId) -> bool {
        let mut map = self.inner.write().await;
        match map.remove(from) {
            Some(handle) => {
                map.insert(to, handle);
                true
            }
            None => {
                warn!(call_id = %from, "rename requested for an unregistered call id");
                false
            }
        }
    }

    /// Drop the registration for a call id.
    pub async fn deregister(&self, call_id: &CallId) {
        self.inner.write().await.remove(call_id);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> SessionHandle {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        SessionHandle::new(tx)
    }

    #[tokio::test]
    async fn rename_moves_the_registration() {
        let registry = SessionRegistry::new();
        registry.register(CallId::from("A"), handle()).await;

        assert!(registry.rename(&CallId::from("A"), CallId::from("B")).await);
        assert!(registry.lookup(&CallId::from("A")).await.is_none());
        assert!(registry.lookup(&CallId::from("B")).await.is_some());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn rename_of_unknown_id_reports_failure() {
        let registry = SessionRegistry::new();
        assert!(!registry.rename(&CallId::from("A"), CallId::from("B")).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn deregister_removes_the_entry() {
        let registry = SessionRegistry::new();
        registry.register(CallId::from("A"), handle()).await;
        registry.deregister(&CallId::from("A")).await;
        assert!(registry.lookup(&CallId::from("A")).await.is_none());
    }
}

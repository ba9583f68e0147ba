//! Open page views.
//!
//! Each page load gets its own [`ChatController`], addressed by a [`ViewId`].
//! The view id is stable for the life of the page; the session id inside the
//! controller may change whenever the backend says so.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::controller::ChatController;
use super::settings::ChatSettings;
use crate::backend::ChatBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(Uuid);

impl ViewId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ViewId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Thread-safe store of open views.
#[derive(Clone)]
pub struct ViewStore {
    inner: Arc<ViewStoreInner>,
}

struct ViewStoreInner {
    views: RwLock<HashMap<ViewId, ChatController>>,
    backend: Arc<dyn ChatBackend>,
    settings: ChatSettings,
}

impl fmt::Debug for ViewStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewStore")
            .field("views", &self.len())
            .finish_non_exhaustive()
    }
}

impl ViewStore {
    /// Controllers created by this store share `backend` and `settings`.
    pub fn new(backend: Arc<dyn ChatBackend>, settings: ChatSettings) -> Self {
        Self {
            inner: Arc::new(ViewStoreInner {
                views: RwLock::new(HashMap::new()),
                backend,
                settings,
            }),
        }
    }

    /// Open a view with a freshly initialized session.
    pub fn open(&self) -> (ViewId, ChatController) {
        let controller =
            ChatController::new(Arc::clone(&self.inner.backend), self.inner.settings.clone());
        controller.initialize_session();

        let id = ViewId::new();
        self.inner
            .views
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, controller.clone());

        tracing::debug!(view_id = %id, "Opened chat view");
        (id, controller)
    }

    #[must_use]
    pub fn get(&self, id: &ViewId) -> Option<ChatController> {
        self.inner
            .views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &ViewId) -> Option<ChatController> {
        self.inner
            .views
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop views idle for longer than `timeout`. Views with an exchange in
    /// flight or a connected event stream are kept.
    ///
    /// Returns the number of views removed.
    pub fn cleanup_expired(&self, timeout: Duration) -> usize {
        let mut guard = self
            .inner
            .views
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|_, view| {
            view.is_busy() || view.has_subscribers() || view.idle_for() <= timeout
        });
        before - guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendRequest;
    use crate::error::BackendError;

    struct Echo;

    #[async_trait::async_trait]
    impl ChatBackend for Echo {
        async fn send(&self, req: &BackendRequest) -> Result<serde_json::Value, BackendError> {
            Ok(serde_json::json!({ "reply": req.message }))
        }
    }

    fn store() -> ViewStore {
        ViewStore::new(Arc::new(Echo), ChatSettings::default())
    }

    #[test]
    fn test_view_store() {
        let store = store();
        assert!(store.is_empty());

        let (id, controller) = store.open();
        assert_eq!(store.len(), 1);
        assert!(controller.session_id().is_some());

        let again = store.get(&id).unwrap();
        assert_eq!(again.session_id(), controller.session_id());

        store.remove(&id);
        assert!(store.is_empty());
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_views_have_distinct_sessions() {
        let store = store();
        let (a, ca) = store.open();
        let (b, cb) = store.open();
        assert_ne!(a, b);
        assert_ne!(ca.session_id(), cb.session_id());
    }

    #[test]
    fn test_cleanup_expired() {
        let store = store();
        store.open();
        store.open();

        assert_eq!(store.cleanup_expired(Duration::from_secs(3600)), 0);
        assert_eq!(store.len(), 2);

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.cleanup_expired(Duration::ZERO), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_cleanup_keeps_busy_views() {
        let store = store();
        let (id, controller) = store.open();
        let _pending = controller.begin("hello");

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.cleanup_expired(Duration::ZERO), 0);
        assert!(store.get(&id).is_some());
    }

    #[test]
    fn test_cleanup_keeps_subscribed_views() {
        let store = store();
        let (id, controller) = store.open();
        let events = controller.subscribe();
        drop(controller);

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.cleanup_expired(Duration::ZERO), 0);
        assert!(store.get(&id).is_some());

        drop(events);
        assert_eq!(store.cleanup_expired(Duration::ZERO), 1);
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_view_id_parse() {
        let id = ViewId::new();
        assert_eq!(id.to_string().parse::<ViewId>().unwrap(), id);
        assert!("not-a-uuid".parse::<ViewId>().is_err());
    }
}

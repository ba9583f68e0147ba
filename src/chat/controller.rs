//! The chat session controller.
//!
//! A [`ChatController`] owns one [`ChatState`] and is its only writer. The
//! state sits behind a mutex that is only held while a transition runs, never
//! across the backend call. The busy check and the busy set happen in the
//! same critical section, so at most one exchange per controller is in flight
//! even when handlers run on several worker threads.
//!
//! Every transition publishes a fresh [`ChatSnapshot`] on a watch channel;
//! renderers subscribe instead of polling.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use super::message::MessageId;
use super::reply::Verdict;
use super::settings::ChatSettings;
use super::state::{ChatSnapshot, ChatState, IgnoreReason, PendingExchange, SessionId};
use crate::backend::{BackendRequest, ChatBackend};

/// Result of the synchronous half of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// User message and placeholder appended, busy set.
    Accepted(PendingExchange),
    /// Nothing changed.
    Ignored(IgnoreReason),
}

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeOutcome {
    Replied,
    ServiceUnavailable,
    MalformedResponse,
    ConnectionError,
}

/// Final text written into a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub placeholder_id: MessageId,
    pub text: String,
    pub outcome: ExchangeOutcome,
}

/// Result of a full [`ChatController::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    Resolved(Resolution),
    Ignored(IgnoreReason),
}

/// Chat session controller. Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct ChatController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    state: Mutex<ChatState>,
    updates: watch::Sender<ChatSnapshot>,
    backend: Arc<dyn ChatBackend>,
    settings: ChatSettings,
    last_activity: Mutex<DateTime<Utc>>,
}

impl fmt::Debug for ChatController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatController")
            .field("session_id", &self.session_id())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl ChatController {
    /// Create a controller. The session is not initialized yet.
    pub fn new(backend: Arc<dyn ChatBackend>, settings: ChatSettings) -> Self {
        let state = ChatState::new(&settings.texts.greeting);
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(state),
                updates,
                backend,
                settings,
                last_activity: Mutex::new(Utc::now()),
            }),
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.inner.settings
    }

    /// Generate the session identifier. Only the first call has an effect.
    pub fn initialize_session(&self) -> SessionId {
        let (id, created) = self.apply(|state| {
            let (id, created) = state.initialize(SessionId::generate());
            (id.clone(), created)
        });
        if created {
            info!(name: "chat.session.initialized", session_id = %id, "Chat session initialized");
        }
        id
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.lock().session_id().cloned()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock().is_busy()
    }

    /// Whether the send control should be enabled for `draft`.
    #[must_use]
    pub fn can_send(&self, draft: &str) -> bool {
        self.lock().can_send(draft)
    }

    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        self.lock().snapshot()
    }

    /// Receive a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.inner.updates.subscribe()
    }

    /// Submit `text` and wait for the exchange to settle.
    pub async fn submit(&self, text: &str) -> SubmitResult {
        match self.begin(text) {
            SubmitOutcome::Accepted(pending) => SubmitResult::Resolved(self.complete(pending).await),
            SubmitOutcome::Ignored(reason) => SubmitResult::Ignored(reason),
        }
    }

    /// Start an exchange without waiting for it.
    ///
    /// On `Accepted` the caller must drive [`Self::complete`]; until then the
    /// controller stays busy.
    pub fn begin(&self, text: &str) -> SubmitOutcome {
        let pending_text = self.inner.settings.texts.pending.as_str();
        match self.apply(|state| state.begin(text, pending_text)) {
            Ok(pending) => {
                info!(
                    name: "chat.exchange.started",
                    session_id = %pending.session_id,
                    placeholder_id = %pending.placeholder_id,
                    message_length = pending.message.len(),
                    "Chat exchange started"
                );
                SubmitOutcome::Accepted(pending)
            }
            Err(reason) => {
                tracing::debug!(reason = %reason, "Submission ignored");
                SubmitOutcome::Ignored(reason)
            }
        }
    }

    /// Run the backend call for `pending` and resolve its placeholder.
    ///
    /// Busy is cleared on every path. If this future is dropped before the
    /// backend answers, the placeholder is resolved as a connection error.
    pub async fn complete(&self, pending: PendingExchange) -> Resolution {
        let mut guard = PendingGuard {
            controller: self,
            placeholder_id: Some(pending.placeholder_id),
        };

        let settings = &self.inner.settings;
        let request = BackendRequest {
            session_id: pending.session_id.to_string(),
            user_id: settings.user.id.clone(),
            customer_name: settings.user.name.clone(),
            message: pending.message,
        };

        let started = Instant::now();
        let result = self.inner.backend.send(&request).await;
        let elapsed = started.elapsed();

        let (text, outcome, session_id) = match result {
            Ok(body) => {
                let classified = settings.reply.classify(&body);
                let (text, outcome) = match classified.verdict {
                    Verdict::Reply(text) => (text, ExchangeOutcome::Replied),
                    Verdict::Missing => (
                        settings.texts.service_unavailable.clone(),
                        ExchangeOutcome::ServiceUnavailable,
                    ),
                    Verdict::TemplateLeak => (
                        settings.texts.malformed_response.clone(),
                        ExchangeOutcome::MalformedResponse,
                    ),
                };
                (text, outcome, classified.session_id.map(SessionId::from))
            }
            Err(e) => {
                warn!(
                    name: "backend.request.failed",
                    session_id = %request.session_id,
                    error = %e,
                    "Backend request failed"
                );
                (
                    settings.texts.connection_error.clone(),
                    ExchangeOutcome::ConnectionError,
                    None,
                )
            }
        };

        if matches!(
            outcome,
            ExchangeOutcome::ServiceUnavailable | ExchangeOutcome::MalformedResponse
        ) {
            warn!(
                name: "chat.reply.fallback",
                session_id = %request.session_id,
                outcome = ?outcome,
                "Backend reply replaced by fallback text"
            );
        }

        if let Some(id) = &session_id
            && id.as_str() != request.session_id
        {
            info!(
                name: "chat.session.moved",
                from = %request.session_id,
                to = %id,
                "Backend assigned a new session id"
            );
        }

        guard.placeholder_id = None;
        self.apply(|state| state.resolve(pending.placeholder_id, text.clone(), session_id));

        info!(
            name: "chat.exchange.resolved",
            placeholder_id = %pending.placeholder_id,
            outcome = ?outcome,
            elapsed_ms = duration_ms(elapsed),
            "Chat exchange resolved"
        );

        Resolution {
            placeholder_id: pending.placeholder_id,
            text,
            outcome,
        }
    }

    /// Whether a page is still listening for snapshots.
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        self.inner.updates.receiver_count() > 0
    }

    /// Time since the last state change.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        let last = *self
            .inner
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        (Utc::now() - last).to_std().unwrap_or(Duration::ZERO)
    }

    /// Apply a transition and publish the resulting snapshot.
    fn apply<R>(&self, f: impl FnOnce(&mut ChatState) -> R) -> R {
        let result = {
            let mut state = self.lock();
            let result = f(&mut state);
            // Published under the lock so observers never see snapshots out of order.
            self.inner.updates.send_replace(state.snapshot());
            result
        };
        self.touch();
        result
    }

    fn touch(&self) {
        let mut guard = self
            .inner
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Utc::now();
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves the placeholder if `complete` is dropped mid-flight.
struct PendingGuard<'a> {
    controller: &'a ChatController,
    placeholder_id: Option<MessageId>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.placeholder_id.take() {
            let text = self.controller.inner.settings.texts.connection_error.clone();
            self.controller.apply(|state| state.resolve(id, text, None));
            warn!(
                name: "chat.exchange.abandoned",
                placeholder_id = %id,
                "Exchange dropped before the backend answered"
            );
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Role;
    use crate::error::BackendError;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every request with the same body and records what it saw.
    struct FixedBackend {
        body: Value,
        calls: AtomicUsize,
        seen: Mutex<Vec<BackendRequest>>,
    }

    impl FixedBackend {
        fn new(body: Value) -> Arc<Self> {
            Arc::new(Self {
                body,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl ChatBackend for FixedBackend {
        async fn send(&self, req: &BackendRequest) -> Result<Value, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(req.clone());
            Ok(self.body.clone())
        }
    }

    struct BrokenBackend;

    #[async_trait::async_trait]
    impl ChatBackend for BrokenBackend {
        async fn send(&self, _req: &BackendRequest) -> Result<Value, BackendError> {
            Err(BackendError::InvalidBody(
                serde_json::from_str::<Value>("<html>").unwrap_err(),
            ))
        }
    }

    fn controller(backend: Arc<dyn ChatBackend>) -> ChatController {
        let settings = ChatSettings {
            texts: crate::chat::ChatTexts {
                greeting: String::new(),
                ..Default::default()
            },
            ..Default::default()
        };
        let c = ChatController::new(backend, settings);
        c.initialize_session();
        c
    }

    #[test]
    fn test_initialize_session_keeps_first_id() {
        let c = controller(FixedBackend::new(json!({})));
        let first = c.session_id().unwrap();
        assert_eq!(c.initialize_session(), first);
        assert_eq!(c.session_id(), Some(first));
    }

    #[tokio::test]
    async fn test_reply_resolves_placeholder() {
        let backend = FixedBackend::new(json!({ "reply": "Hello" }));
        let c = controller(backend.clone());

        let SubmitResult::Resolved(res) = c.submit("hi").await else {
            panic!("submission ignored");
        };
        assert_eq!(res.outcome, ExchangeOutcome::Replied);

        let snap = c.snapshot();
        assert!(!snap.busy);
        assert_eq!(snap.messages.len(), 2);
        assert_eq!(snap.messages[0].role, Role::User);
        assert_eq!(snap.messages[1].text, "Hello");
        assert_eq!(snap.messages[1].id, res.placeholder_id);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_request_carries_identity() {
        let backend = FixedBackend::new(json!({ "reply": "ok" }));
        let c = controller(backend.clone());
        let session = c.session_id().unwrap();

        c.submit("  hello  ").await;

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].session_id, session.as_str());
        assert_eq!(seen[0].user_id, "U-001");
        assert_eq!(seen[0].customer_name, "Somchai");
        assert_eq!(seen[0].message, "hello");
    }

    #[tokio::test]
    async fn test_transport_failure_uses_connection_error() {
        let c = controller(Arc::new(BrokenBackend));
        let SubmitResult::Resolved(res) = c.submit("hi").await else {
            panic!("submission ignored");
        };
        assert_eq!(res.outcome, ExchangeOutcome::ConnectionError);
        assert_eq!(res.text, c.settings().texts.connection_error);
        assert!(!c.is_busy());
    }

    #[tokio::test]
    async fn test_begin_while_busy_is_ignored() {
        let backend = FixedBackend::new(json!({ "reply": "ok" }));
        let c = controller(backend.clone());

        let SubmitOutcome::Accepted(pending) = c.begin("first") else {
            panic!("first submission ignored");
        };
        assert_eq!(c.begin("second"), SubmitOutcome::Ignored(IgnoreReason::Busy));
        assert_eq!(c.snapshot().messages.len(), 2);

        c.complete(pending).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(c.can_send("third"));
    }

    #[tokio::test]
    async fn test_dropped_exchange_clears_busy() {
        struct Hang;

        #[async_trait::async_trait]
        impl ChatBackend for Hang {
            async fn send(&self, _req: &BackendRequest) -> Result<Value, BackendError> {
                futures::future::pending().await
            }
        }

        let c = controller(Arc::new(Hang));
        let SubmitOutcome::Accepted(pending) = c.begin("hi") else {
            panic!("submission ignored");
        };
        let placeholder = pending.placeholder_id;

        let res = tokio::time::timeout(Duration::from_millis(20), c.complete(pending)).await;
        assert!(res.is_err());

        let snap = c.snapshot();
        assert!(!snap.busy);
        let resolved = snap.messages.iter().find(|m| m.id == placeholder).unwrap();
        assert_eq!(resolved.text, c.settings().texts.connection_error);
    }

    #[tokio::test]
    async fn test_subscribers_see_pending_then_resolved() {
        let c = controller(FixedBackend::new(json!({ "reply": "done" })));
        let mut rx = c.subscribe();

        let SubmitOutcome::Accepted(pending) = c.begin("hi") else {
            panic!("submission ignored");
        };
        rx.changed().await.unwrap();
        {
            let snap = rx.borrow_and_update();
            assert!(snap.busy);
            assert_eq!(snap.messages[1].text, c.settings().texts.pending);
        }

        c.complete(pending).await;
        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update();
        assert!(!snap.busy);
        assert_eq!(snap.messages[1].text, "done");
    }
}

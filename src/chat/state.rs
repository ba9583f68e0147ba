//! Chat state and its transitions.
//!
//! [`ChatState`] is plain data. Every change goes through one of the
//! transition methods below; none of them block or perform I/O, so the
//! controller can apply them inside a short critical section.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{Message, MessageId};

/// Opaque session identifier.
///
/// Generated locally when a session starts; the backend may hand back a
/// different one at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a submission was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Nothing left after trimming.
    Empty,
    /// An exchange is already in flight.
    Busy,
    /// `initialize_session` has not run yet.
    NotInitialized,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::Busy => "busy",
            Self::NotInitialized => "not_initialized",
        };
        f.write_str(s)
    }
}

/// An exchange between submission and resolution.
///
/// Correlates the outbound message with the placeholder that will receive
/// the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExchange {
    pub placeholder_id: MessageId,
    /// Session id at the time of submission.
    pub session_id: SessionId,
    /// Trimmed user text.
    pub message: String,
}

/// Read-only view of the state handed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSnapshot {
    pub session_id: Option<SessionId>,
    pub messages: Vec<Message>,
    pub busy: bool,
}

impl ChatSnapshot {
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.session_id.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    session_id: Option<SessionId>,
    messages: Vec<Message>,
    busy: bool,
}

impl ChatState {
    /// Empty state. A non-empty `greeting` becomes the first assistant message.
    #[must_use]
    pub fn new(greeting: &str) -> Self {
        let mut state = Self::default();
        if !greeting.trim().is_empty() {
            state.messages.push(Message::assistant(greeting));
        }
        state
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Set the session id once. Later calls keep the existing id.
    ///
    /// Returns the current id and whether this call set it.
    pub fn initialize(&mut self, id: SessionId) -> (&SessionId, bool) {
        let created = self.session_id.is_none();
        (self.session_id.get_or_insert(id), created)
    }

    /// Whether a submission of `draft` would be accepted right now.
    #[must_use]
    pub fn can_send(&self, draft: &str) -> bool {
        self.check(draft).is_ok()
    }

    fn check(&self, text: &str) -> Result<SessionId, IgnoreReason> {
        let Some(session_id) = &self.session_id else {
            return Err(IgnoreReason::NotInitialized);
        };
        if self.busy {
            return Err(IgnoreReason::Busy);
        }
        if text.trim().is_empty() {
            return Err(IgnoreReason::Empty);
        }
        Ok(session_id.clone())
    }

    /// Start an exchange: mark busy, append the user message and the
    /// placeholder. On rejection the state is left untouched.
    pub fn begin(
        &mut self,
        text: &str,
        pending_text: &str,
    ) -> Result<PendingExchange, IgnoreReason> {
        let session_id = self.check(text)?;
        let message = text.trim().to_string();

        self.busy = true;
        self.messages.push(Message::user(message.clone()));
        let placeholder = Message::assistant(pending_text);
        let placeholder_id = placeholder.id;
        self.messages.push(placeholder);

        Ok(PendingExchange {
            placeholder_id,
            session_id,
            message,
        })
    }

    /// Finish an exchange: overwrite the placeholder in place, adopt a
    /// session id handed back by the backend, and clear busy.
    ///
    /// Returns `false` if the placeholder was not found; busy is cleared
    /// either way.
    pub fn resolve(
        &mut self,
        placeholder_id: MessageId,
        text: String,
        session_id: Option<SessionId>,
    ) -> bool {
        if let Some(id) = session_id {
            self.session_id = Some(id);
        }
        self.busy = false;

        match self.messages.iter_mut().find(|m| m.id == placeholder_id) {
            Some(placeholder) => {
                placeholder.text = text;
                placeholder.timestamp = Utc::now();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            session_id: self.session_id.clone(),
            messages: self.messages.clone(),
            busy: self.busy,
        }
    }
}

//! Per-controller settings.

use super::reply::ReplyPolicy;

/// Identity sent along with every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    /// Display name, sent as `customer_name`.
    pub name: String,
}

impl Default for UserIdentity {
    fn default() -> Self {
        Self {
            id: "U-001".to_string(),
            name: "Somchai".to_string(),
        }
    }
}

/// Fixed texts shown in the thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTexts {
    /// First assistant message of every session. Empty disables it.
    pub greeting: String,
    /// Placeholder text while a reply is pending.
    pub pending: String,
    pub service_unavailable: String,
    pub malformed_response: String,
    pub connection_error: String,
}

impl Default for ChatTexts {
    fn default() -> Self {
        Self {
            greeting: "Hello! Type a message to start chatting.".to_string(),
            pending: "Typing...".to_string(),
            service_unavailable: "Sorry, the service cannot answer right now.".to_string(),
            malformed_response: "Sorry, the service returned a malformed response.".to_string(),
            connection_error: "Connection error.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSettings {
    pub user: UserIdentity,
    pub texts: ChatTexts,
    pub reply: ReplyPolicy,
}

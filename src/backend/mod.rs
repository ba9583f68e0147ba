//! The remote chat backend.
//!
//! The controller talks to the backend through the [`ChatBackend`] trait,
//! which carries exactly one operation: post a message and hand back the
//! decoded JSON body. Interpretation of that body lives in
//! [`crate::chat::reply`].
//!
//! - [`HttpBackend`]: JSON over HTTP POST (a workflow webhook)

mod http;

pub use http::HttpBackend;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Outbound request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRequest {
    pub session_id: String,
    pub user_id: String,
    /// Display name of the user.
    pub customer_name: String,
    pub message: String,
}

#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one message and return the decoded response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be delivered, the body is not
    /// JSON, or a configured timeout elapses.
    async fn send(&self, req: &BackendRequest) -> Result<serde_json::Value, BackendError>;
}

//! JSON-over-HTTP backend.

use std::time::Duration;

use url::Url;

use super::{BackendRequest, ChatBackend};
use crate::error::{AppError, BackendError};

/// Posts each message to a fixed URL.
///
/// No authentication headers and no retries. The response body is decoded
/// as JSON regardless of the HTTP status; the reply policy decides what the
/// body is worth.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    url: Url,
    http: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpBackend {
    /// Create a backend for `url` with a default HTTP client.
    pub fn new(url: impl AsRef<str>) -> Result<Self, AppError> {
        Self::with_client(url, reqwest::Client::builder().build()?)
    }

    /// Create a backend with a custom reqwest client.
    pub fn with_client(url: impl AsRef<str>, http: reqwest::Client) -> Result<Self, AppError> {
        let url = Url::parse(url.as_ref())?;
        Ok(Self {
            url,
            http,
            timeout: None,
        })
    }

    /// Per-request timeout. `None` waits for as long as the backend takes.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn classify_error(&self, err: reqwest::Error) -> BackendError {
        match self.timeout {
            Some(limit) if err.is_timeout() => BackendError::Timeout(limit),
            _ => BackendError::Transport(err),
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for HttpBackend {
    async fn send(&self, req: &BackendRequest) -> Result<serde_json::Value, BackendError> {
        let mut request = self.http.post(self.url.clone()).json(req);
        if let Some(limit) = self.timeout {
            request = request.timeout(limit);
        }

        tracing::debug!(
            url = %self.url,
            session_id = %req.session_id,
            message_length = req.message.len(),
            "Posting message to backend"
        );

        let response = request.send().await.map_err(|e| self.classify_error(e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                name: "backend.response.status",
                status = status.as_u16(),
                session_id = %req.session_id,
                "Backend answered with a non-success status"
            );
        }

        let bytes = response.bytes().await.map_err(|e| self.classify_error(e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

//! Web chat widget.
//!
//! A single-page chat that forwards each message to a remote workflow
//! endpoint and shows the reply in the thread.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server, one chat controller per open page
//! - **Chat**: session state, pure transitions, reply validation
//! - **Backend**: one JSON POST per message to the configured webhook
//! - **UI**: server-rendered HTML, live updates over SSE
//!
//! # Modules
//!
//! - [`backend`]: backend trait and HTTP implementation
//! - [`chat`]: chat session controller and view store
//! - [`config`]: layered configuration
//! - [`ui`]: HTML rendering

#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::unused_async)]

pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod server;
pub mod ui;

use std::sync::Arc;

use backend::ChatBackend;
use chat::ViewStore;
use config::AppConfig;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Open page views, one controller each.
    pub views: ViewStore,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, backend: Arc<dyn ChatBackend>) -> Self {
        let views = ViewStore::new(backend, config.chat_settings());
        Self { views, config }
    }
}

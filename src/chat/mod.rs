//! Chat session management.
//!
//! # Architecture
//!
//! - [`ChatState`]: messages, session id and busy flag, changed only through
//!   pure transitions
//! - [`ChatController`]: owns one state, drives the backend call, publishes
//!   [`ChatSnapshot`]s
//! - [`ReplyPolicy`]: decides what a backend response body is worth
//! - [`ViewStore`]: one controller per open page view
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webchat::backend::HttpBackend;
//! use webchat::chat::{ChatController, ChatSettings, SubmitResult};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(HttpBackend::new("http://127.0.0.1:5678/webhook/chat")?);
//! let chat = ChatController::new(backend, ChatSettings::default());
//! chat.initialize_session();
//!
//! if let SubmitResult::Resolved(res) = chat.submit("Hello!").await {
//!     println!("{}", res.text);
//! }
//! # Ok(())
//! # }
//! ```

mod controller;
mod message;
pub mod reply;
mod settings;
mod state;
mod views;

pub use controller::{ChatController, ExchangeOutcome, Resolution, SubmitOutcome, SubmitResult};
pub use message::{Message, MessageId, Role};
pub use reply::{Classified, ReplyPolicy, Verdict};
pub use settings::{ChatSettings, ChatTexts, UserIdentity};
pub use state::{ChatSnapshot, ChatState, IgnoreReason, PendingExchange, SessionId};
pub use views::{ViewId, ViewStore};

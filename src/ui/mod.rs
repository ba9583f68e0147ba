//! Server-rendered HTML.
//!
//! - [`page`]: the document shell and the chat page
//! - [`thread`]: the message list fragment pushed on every update

pub mod page;
pub mod thread;

pub use page::{chat_page, html_shell};
pub use thread::{escape_html, render_thread};

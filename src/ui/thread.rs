//! Thread fragment rendering.

use crate::chat::{Message, Role};

/// Render the message list as an HTML fragment, in insertion order.
pub fn render_thread(messages: &[Message]) -> String {
    let mut html = String::new();
    for message in messages {
        render_message(&mut html, message);
    }
    html
}

fn render_message(out: &mut String, message: &Message) {
    let role = message.role.as_str();
    let align = match message.role {
        Role::User => "justify-end",
        Role::Assistant => "justify-start",
    };
    out.push_str(&format!(
        r#"<div class="msg-row {align}" id="msg-{id}"><div class="msg msg-{role}"><div class="msg-meta"><span class="msg-role">{role}</span> <time datetime="{ts}">{time}</time></div><div class="msg-text">{text}</div></div></div>"#,
        id = message.id,
        ts = message.timestamp.to_rfc3339(),
        time = message.timestamp.format("%H:%M"),
        text = escape_html(&message.text),
    ));
}

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

//! Full-page HTML.

use super::thread::{escape_html, render_thread};
use crate::chat::{ChatSnapshot, ViewId};

/// Inline stylesheet. No external assets, the page works offline.
const STYLE: &str = r"
* { box-sizing: border-box; }
body { margin: 0; min-height: 100vh; background: #fff; color: #111; font-family: system-ui, sans-serif; }
.container { max-width: 56rem; margin: 0 auto; padding: 1.5rem; }
h1 { font-size: 1.875rem; margin: 0 0 1rem; }
.panel { border: 1px solid #ddd; border-radius: 0.75rem; padding: 1rem; }
#thread { height: 520px; overflow-y: auto; border: 1px solid #ddd; border-radius: 0.5rem; padding: 1rem; display: flex; flex-direction: column; gap: 1.5rem; }
.msg-row { display: flex; }
.justify-end { justify-content: flex-end; }
.justify-start { justify-content: flex-start; }
.msg { max-width: 75%; border: 1px solid #ddd; border-radius: 0.5rem; padding: 0.75rem; }
.msg-user { background: #f5f5f5; }
.msg-meta { font-size: 0.75rem; color: #444; }
.msg-text { white-space: pre-wrap; font-weight: 500; }
form { display: flex; gap: 0.75rem; margin-top: 1rem; }
input[name=message] { flex: 1; border: 1px solid #ddd; border-radius: 0.5rem; padding: 0.75rem 1rem; font-size: 1rem; }
button { border: 0; border-radius: 0.5rem; background: #000; color: #fff; padding: 0.75rem 1.5rem; }
button:disabled { opacity: 0.5; }
.session { margin-top: 0.75rem; font-size: 0.875rem; color: #555; }
.session code { font-family: ui-monospace, monospace; }
.notice { margin-top: 0.75rem; color: #b00020; }
";

/// Client glue: mirrors server snapshots into the DOM and posts submissions.
const SCRIPT: &str = r"
(() => {
  const root = document.getElementById('chat');
  const view = root.dataset.view;
  const thread = document.getElementById('thread');
  const form = document.getElementById('composer');
  const input = form.querySelector('input[name=message]');
  const button = form.querySelector('button');
  const session = document.getElementById('session-id');
  const notice = document.getElementById('notice');
  let busy = root.dataset.busy === 'true';
  let serverBusy = busy;
  let ready = session.textContent.trim() !== '';

  const refresh = () => {
    input.disabled = busy;
    button.disabled = busy || !ready || input.value.trim() === '';
  };
  const scroll = () => thread.lastElementChild?.scrollIntoView({ behavior: 'smooth' });

  const events = new EventSource(`/api/views/${view}/events`);
  const expire = () => {
    events.close();
    ready = false;
    notice.hidden = false;
    refresh();
  };
  events.addEventListener('snapshot', (e) => {
    const snap = JSON.parse(e.data);
    thread.innerHTML = snap.html;
    session.textContent = snap.session_id ?? '';
    busy = serverBusy = snap.busy;
    ready = !!snap.session_id;
    refresh();
    scroll();
  });
  events.addEventListener('error', () => {
    if (events.readyState === EventSource.CLOSED) expire();
  });

  form.addEventListener('submit', async (e) => {
    e.preventDefault();
    const text = input.value.trim();
    if (!text || busy || !ready) return;
    input.value = '';
    busy = true;
    refresh();
    let accepted = false;
    try {
      const res = await fetch(`/api/views/${view}/messages`, {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ message: text }),
      });
      if (res.status === 404) {
        expire();
      } else if (res.ok) {
        accepted = (await res.json()).accepted === true;
      }
    } catch (_) {
      accepted = false;
    }
    // Rejected submissions produce no snapshot.
    if (!accepted) {
      busy = serverBusy;
      if (input.value === '') input.value = text;
      refresh();
    }
  });
  input.addEventListener('input', refresh);

  refresh();
  scroll();
})();
";

/// Generate the HTML shell for the application.
pub fn html_shell(title: &str, content: &str) -> String {
    let title = escape_html(title);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <main class="container">
        <h1>{title}</h1>
        {content}
    </main>
</body>
</html>"#
    )
}

/// Chat page for one view, pre-rendered from `snapshot` so it is usable
/// before the event stream connects.
pub fn chat_page(
    title: &str,
    placeholder: &str,
    expired_notice: &str,
    view: ViewId,
    snapshot: &ChatSnapshot,
) -> String {
    let thread = render_thread(&snapshot.messages);
    let session = snapshot
        .session_id
        .as_ref()
        .map(|s| escape_html(s.as_str()))
        .unwrap_or_default();
    let placeholder = escape_html(placeholder);
    let expired_notice = escape_html(expired_notice);
    let busy = snapshot.busy;

    let content = format!(
        r#"<div id="chat" class="panel" data-view="{view}" data-busy="{busy}">
            <div id="thread" aria-live="polite" aria-label="Chat messages">{thread}</div>
            <form id="composer" autocomplete="off">
                <input name="message" type="text" placeholder="{placeholder}">
                <button type="submit" disabled>Send</button>
            </form>
            <div class="session">Session: <code id="session-id">{session}</code></div>
            <div id="notice" class="notice" role="alert" hidden>{expired_notice}</div>
        </div>
        <script>{SCRIPT}</script>"#
    );
    html_shell(title, &content)
}

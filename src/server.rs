//! HTTP surface: the chat page, the per-view JSON API and the snapshot stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::backend::HttpBackend;
use crate::chat::{ChatSnapshot, IgnoreReason, MessageId, SessionId, SubmitOutcome, ViewId, ViewStore};
use crate::config::AppConfig;
use crate::ui;

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let backend =
        HttpBackend::new(&config.backend.url)?.with_timeout(config.backend.timeout());

    info!(
        name: "backend.config.loaded",
        url = %backend.url(),
        timeout_secs = ?config.backend.timeout_secs,
        "Backend configuration loaded"
    );

    let state = AppState::new(Arc::clone(&config), Arc::new(backend));

    spawn_view_cleanup(
        state.views.clone(),
        config.server.cleanup_interval(),
        config.server.view_idle_timeout(),
    );

    let app = build_router(state);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %format!("http://{addr}"),
        "Server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // HTML pages
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        // Per-view API
        .route("/api/views/{id}", get(api_get_view).delete(api_close_view))
        .route("/api/views/{id}/messages", post(api_post_message))
        .route("/api/views/{id}/thread", get(api_get_thread))
        .route("/api/views/{id}/events", get(api_view_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically drop idle views.
fn spawn_view_cleanup(views: ViewStore, every: Duration, idle_timeout: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let removed = views.cleanup_expired(idle_timeout);
            if removed > 0 {
                info!(
                    name: "views.expired",
                    removed,
                    remaining = views.len(),
                    "Dropped idle chat views"
                );
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET / - Open a view and render the chat page.
async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (view, controller) = state.views.open();
    let texts = &state.config.texts;
    Html(ui::chat_page(
        &texts.title,
        &texts.input_placeholder,
        &texts.view_expired,
        view,
        &controller.snapshot(),
    ))
}

async fn health_handler() -> &'static str {
    "ok"
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for posting a message.
#[derive(Debug, Deserialize)]
struct PostMessageRequest {
    message: String,
}

/// Response to a message submission.
#[derive(Debug, Serialize)]
struct PostMessageResponse {
    accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<IgnoreReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    placeholder_id: Option<MessageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<SessionId>,
}

/// One SSE `snapshot` event.
#[derive(Debug, Serialize)]
struct SnapshotEvent {
    session_id: Option<SessionId>,
    busy: bool,
    html: String,
}

impl From<&ChatSnapshot> for SnapshotEvent {
    fn from(snapshot: &ChatSnapshot) -> Self {
        Self {
            session_id: snapshot.session_id.clone(),
            busy: snapshot.busy,
            html: ui::render_thread(&snapshot.messages),
        }
    }
}

fn view_not_found(id: ViewId) -> Response {
    tracing::debug!(view_id = %id, "View not found");
    (StatusCode::NOT_FOUND, "View not found").into_response()
}

/// GET /api/views/{id} - Current snapshot as JSON.
async fn api_get_view(State(state): State<AppState>, Path(id): Path<ViewId>) -> Response {
    match state.views.get(&id) {
        Some(controller) => Json(controller.snapshot()).into_response(),
        None => view_not_found(id),
    }
}

/// POST /api/views/{id}/messages - Submit a message.
///
/// The placeholder is in place when this returns; the backend call runs in
/// the background and its result arrives through the event stream.
async fn api_post_message(
    State(state): State<AppState>,
    Path(id): Path<ViewId>,
    Json(req): Json<PostMessageRequest>,
) -> Response {
    let Some(controller) = state.views.get(&id) else {
        return view_not_found(id);
    };

    match controller.begin(&req.message) {
        SubmitOutcome::Accepted(pending) => {
            let body = PostMessageResponse {
                accepted: true,
                reason: None,
                placeholder_id: Some(pending.placeholder_id),
                session_id: Some(pending.session_id.clone()),
            };
            tokio::spawn(async move {
                controller.complete(pending).await;
            });
            (StatusCode::ACCEPTED, Json(body)).into_response()
        }
        SubmitOutcome::Ignored(reason) => {
            tracing::debug!(view_id = %id, reason = %reason, "Message ignored");
            Json(PostMessageResponse {
                accepted: false,
                reason: Some(reason),
                placeholder_id: None,
                session_id: None,
            })
            .into_response()
        }
    }
}

/// GET /api/views/{id}/thread - Thread as an HTML fragment.
async fn api_get_thread(State(state): State<AppState>, Path(id): Path<ViewId>) -> Response {
    match state.views.get(&id) {
        Some(controller) => Html(ui::render_thread(&controller.snapshot().messages)).into_response(),
        None => view_not_found(id),
    }
}

/// GET /api/views/{id}/events - SSE stream of snapshots.
///
/// The current snapshot is sent first, then one event per state change.
async fn api_view_events(State(state): State<AppState>, Path(id): Path<ViewId>) -> Response {
    let Some(controller) = state.views.get(&id) else {
        return view_not_found(id);
    };
    info!(view_id = %id, "Starting snapshot stream");
    snapshot_sse(WatchStream::new(controller.subscribe())).into_response()
}

fn snapshot_sse<S>(snapshots: S) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send>
where
    S: Stream<Item = ChatSnapshot> + Send + 'static,
{
    let stream = snapshots.map(|snapshot| {
        let json = serde_json::to_string(&SnapshotEvent::from(&snapshot))
            .unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().event("snapshot").data(json))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// DELETE /api/views/{id} - Close a view.
async fn api_close_view(State(state): State<AppState>, Path(id): Path<ViewId>) -> StatusCode {
    match state.views.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

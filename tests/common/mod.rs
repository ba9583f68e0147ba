//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use serde_json::Value;
use webchat::config::{
    AppConfig, BackendConfig, ReplyConfig, ServerConfig, TextsConfig, UserConfig,
};

/// What the fake upstream answers with.
#[derive(Clone, Debug)]
pub enum Answer {
    Json(StatusCode, Value),
    Raw(StatusCode, String),
    /// Sleep, then answer with the JSON body.
    Slow(Duration, Value),
}

#[derive(Clone)]
struct UpstreamState {
    answers: Arc<Mutex<Vec<Answer>>>,
    seen: Arc<Mutex<Vec<Value>>>,
}

/// A throwaway webhook on 127.0.0.1 standing in for the workflow engine.
pub struct Upstream {
    pub url: String,
    seen: Arc<Mutex<Vec<Value>>>,
}

impl Upstream {
    /// Start an upstream that plays `answers` in order, repeating the last one.
    pub async fn start(answers: Vec<Answer>) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = UpstreamState {
            answers: Arc::new(Mutex::new(answers)),
            seen: Arc::clone(&seen),
        };
        let app = Router::new()
            .route("/webhook/chat", post(webhook))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/webhook/chat"),
            seen,
        }
    }

    pub fn requests(&self) -> Vec<Value> {
        self.seen.lock().unwrap().clone()
    }
}

async fn webhook(State(state): State<UpstreamState>, Json(body): Json<Value>) -> impl IntoResponse {
    state.seen.lock().unwrap().push(body);
    let answer = {
        let mut answers = state.answers.lock().unwrap();
        if answers.len() > 1 {
            answers.remove(0)
        } else {
            answers[0].clone()
        }
    };
    match answer {
        Answer::Json(status, body) => (status, Json(body)).into_response(),
        Answer::Raw(status, text) => (status, text).into_response(),
        Answer::Slow(delay, body) => {
            tokio::time::sleep(delay).await;
            Json(body).into_response()
        }
    }
}

/// A URL on which nothing listens.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/webhook/chat")
}

/// Configuration built in memory, independent of env and files.
pub fn test_config(backend_url: &str) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            view_idle_timeout_secs: 3600,
            cleanup_interval_secs: 60,
        },
        backend: BackendConfig {
            url: backend_url.to_string(),
            timeout_secs: None,
        },
        user: UserConfig {
            id: "U-001".to_string(),
            name: "Somchai".to_string(),
        },
        texts: TextsConfig {
            title: "Test Chat".to_string(),
            greeting: "Welcome".to_string(),
            pending: "Typing...".to_string(),
            service_unavailable: "service unavailable".to_string(),
            malformed_response: "malformed response".to_string(),
            connection_error: "connection error".to_string(),
            input_placeholder: "Type a message...".to_string(),
            view_expired: "view expired".to_string(),
        },
        reply: ReplyConfig {
            leak_markers: vec!["{{$json".to_string(), "{{ $json".to_string()],
        },
    }
}

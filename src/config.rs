use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::chat::reply::DEFAULT_LEAK_MARKERS;
use crate::chat::{ChatSettings, ChatTexts, ReplyPolicy, UserIdentity};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Chat backend (workflow webhook) URL
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Backend request timeout in seconds (unset = wait indefinitely)
    #[arg(long, env = "BACKEND_TIMEOUT_SECS")]
    pub backend_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub user: UserConfig,
    pub texts: TextsConfig,
    pub reply: ReplyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Views without activity for this long are dropped.
    pub view_idle_timeout_secs: u64,
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TextsConfig {
    pub title: String,
    pub greeting: String,
    pub pending: String,
    pub service_unavailable: String,
    pub malformed_response: String,
    pub connection_error: String,
    pub input_placeholder: String,
    /// Shown when the page's view is gone and a reload is needed.
    pub view_expired: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplyConfig {
    pub leak_markers: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.view_idle_timeout_secs", 60 * 60)?
            .set_default("server.cleanup_interval_secs", 60)?
            .set_default("backend.url", "http://127.0.0.1:5678/webhook/chat")?
            .set_default("user.id", "U-001")?
            .set_default("user.name", "Somchai")?
            .set_default("texts.title", "Web Chat")?
            .set_default("texts.greeting", "Hello! Type a message to start chatting.")?
            .set_default("texts.pending", "Typing...")?
            .set_default(
                "texts.service_unavailable",
                "Sorry, the service cannot answer right now.",
            )?
            .set_default(
                "texts.malformed_response",
                "Sorry, the service returned a malformed response.",
            )?
            .set_default("texts.connection_error", "Connection error.")?
            .set_default("texts.input_placeholder", "Type a message...")?
            .set_default(
                "texts.view_expired",
                "This chat has expired. Reload the page to start again.",
            )?
            .set_default("reply.leak_markers", DEFAULT_LEAK_MARKERS.to_vec())?;

        // Explicit file wins, otherwise pick up ./webchat.{yaml,toml,json} if present.
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("webchat").required(false)),
        };

        // WEBCHAT_SERVER__PORT=8000, WEBCHAT_BACKEND__URL=...
        builder = builder.add_source(
            Environment::with_prefix("WEBCHAT")
                .prefix_separator("_")
                .separator("__"),
        );

        // CLI flags (and their clap env vars) take precedence over everything.
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(url) = cli.backend_url {
            builder = builder.set_override("backend.url", url)?;
        }
        if let Some(secs) = cli.backend_timeout_secs {
            builder = builder.set_override("backend.timeout_secs", secs)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.backend.url.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "backend.url cannot be empty".to_string(),
            ));
        }
        if self.user.id.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "user.id cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings handed to every chat controller.
    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            user: UserIdentity {
                id: self.user.id.clone(),
                name: self.user.name.clone(),
            },
            texts: ChatTexts {
                greeting: self.texts.greeting.clone(),
                pending: self.texts.pending.clone(),
                service_unavailable: self.texts.service_unavailable.clone(),
                malformed_response: self.texts.malformed_response.clone(),
                connection_error: self.texts.connection_error.clone(),
            },
            reply: ReplyPolicy::new(self.reply.leak_markers.iter().cloned()),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn view_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.view_idle_timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

use anyhow::{Context, Result};

use access_news_events::store::{DEFAULT_HEADS, DEFAULT_ROOT};

/// Admin configuration loaded from environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    // Realtime Database
    pub database_url: String,
    pub auth_token: Option<String>,

    // Identity Toolkit
    pub api_key: Option<String>,

    // Event store layout
    pub event_store_root: String,
    pub event_store_heads: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_vars(|name| std::env::var(name).ok())?;
        config.log_keys();
        Ok(config)
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let set = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url: set("FIREBASE_DATABASE_URL")
                .context("FIREBASE_DATABASE_URL must be set")?
                .trim_end_matches('/')
                .to_string(),
            auth_token: set("FIREBASE_AUTH_TOKEN"),
            api_key: set("FIREBASE_API_KEY"),
            event_store_root: set("EVENT_STORE_ROOT").unwrap_or_else(|| DEFAULT_ROOT.to_string()),
            event_store_heads: set("EVENT_STORE_HEADS")
                .unwrap_or_else(|| DEFAULT_HEADS.to_string()),
        })
    }

    /// The Identity Toolkit key, required only by commands that create users.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .context("FIREBASE_API_KEY must be set to manage users")
    }

    fn log_keys(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => preview(v),
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  FIREBASE_DATABASE_URL: {}", self.database_url);
        tracing::info!("  FIREBASE_AUTH_TOKEN: {}", preview_opt(&self.auth_token));
        tracing::info!("  FIREBASE_API_KEY: {}", preview_opt(&self.api_key));
        tracing::info!("  EVENT_STORE_ROOT: {}", self.event_store_root);
        tracing::info!("  EVENT_STORE_HEADS: {}", self.event_store_heads);
    }
}

fn preview(val: &str) -> String {
    let head: String = val.chars().take(5).collect();
    format!("{}...({} chars)", head, val.chars().count())
}

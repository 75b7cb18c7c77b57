use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";

/// Server settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub assist_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("CIRCLE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CIRCLE_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let db_path = var("CIRCLE_DB_PATH").unwrap_or_else(|| "share-circle.db".into()).into();
        let host = var("CIRCLE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("CIRCLE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("CIRCLE_PORT is not a port number")?;
        let addr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;

        let gemini_api_key = var("CIRCLE_GEMINI_API_KEY").filter(|k| !k.trim().is_empty());
        let gemini_model = var("CIRCLE_GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into());
        let assist_timeout = var("CIRCLE_ASSIST_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            gemini_api_key,
            gemini_model,
            assist_timeout,
        })
    }
}

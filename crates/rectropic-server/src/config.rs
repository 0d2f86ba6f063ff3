use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub store_timeout: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("RECTROPIC_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("RECTROPIC_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let port = match get("RECTROPIC_PORT") {
            Some(v) => v.parse().with_context(|| format!("RECTROPIC_PORT '{}' is not a port", v))?,
            None => 3001,
        };
        let store_timeout_ms: u64 = match get("RECTROPIC_STORE_TIMEOUT_MS") {
            Some(v) => v.parse().with_context(|| format!("RECTROPIC_STORE_TIMEOUT_MS '{}' is not a number", v))?,
            None => 5000,
        };
        let request_timeout_secs: u64 = match get("RECTROPIC_REQUEST_TIMEOUT_SECS") {
            Some(v) => v.parse().with_context(|| format!("RECTROPIC_REQUEST_TIMEOUT_SECS '{}' is not a number", v))?,
            None => 30,
        };

        Ok(Self {
            jwt_secret,
            db_path: get("RECTROPIC_DB_PATH").unwrap_or_else(|| "rectropic.db".into()).into(),
            host: get("RECTROPIC_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            store_timeout: Duration::from_millis(store_timeout_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}

use std::path::PathBuf;

use anyhow::{Context, Result};

/// SMTP relay settings. Absent when `SMTP_HOST` is not set.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Server configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub port: u16,
    /// Public origin used in activation and tracking links.
    pub base_url: String,
    pub jwt_secret: String,
    pub mail_from: String,
    pub smtp: Option<SmtpConfig>,
    /// Platform administrator created on first start.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match var("PORT").map(|p| p.parse::<u16>()) {
            Some(Ok(port)) => port,
            Some(Err(e)) => {
                tracing::warn!("invalid PORT ({e}), using 3000");
                3000
            }
            None => 3000,
        };

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set, using a random secret; tokens will not survive a restart");
                awarenow_api::crypto::generate_token().context("generating JWT secret")?
            }
        };

        let smtp = var("SMTP_HOST").map(|host| SmtpConfig {
            host,
            port: var("SMTP_PORT").and_then(|p| p.parse().ok()),
            username: var("SMTP_USER"),
            password: var("SMTP_PASS"),
        });

        Ok(Self {
            data_dir: var("AWARENOW_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            port,
            base_url: var("BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            jwt_secret,
            mail_from: var("SMTP_FROM").unwrap_or_else(|| "AwareNow <no-reply@awarenow.local>".into()),
            smtp,
            admin_email: var("AWARENOW_ADMIN_EMAIL"),
            admin_password: var("AWARENOW_ADMIN_PASSWORD"),
        })
    }
}

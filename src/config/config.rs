use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use reqwest::Url;

use crate::formatter::NumberLocale;

#[derive(Debug, Clone)]
pub struct Config {
    // API
    pub api_url: String,
    pub http_timeout: Duration,

    // Client-side persisted state
    pub state_file: PathBuf,

    // Presentation
    pub locale: NumberLocale,
    pub callback_fallback: Duration,

    // Logging
    pub log_file: PathBuf,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            // API
            api_url: env::var("DAYBAL_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000/api".to_string()),
            http_timeout: Duration::from_secs(
                env::var("DAYBAL_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),

            // Client-side persisted state
            state_file: env::var("DAYBAL_STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir().join("session.json")),

            // Presentation
            locale: env::var("DAYBAL_LOCALE")
                .map(|tag| NumberLocale::from_tag(&tag))
                .unwrap_or_default(),
            callback_fallback: Duration::from_millis(
                env::var("DAYBAL_CALLBACK_FALLBACK_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(2000),
            ),

            // Logging
            log_file: env::var("DAYBAL_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir().join("daybal.log")),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api_url)
            .map_err(|e| anyhow::anyhow!("DAYBAL_API_URL is not a valid URL ({}): {}", self.api_url, e))?;

        if self.http_timeout.is_zero() {
            return Err(anyhow::anyhow!("DAYBAL_HTTP_TIMEOUT_SECS must be greater than zero"));
        }

        Ok(())
    }

    /// Join an endpoint path onto the configured API base.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("daybal")
}

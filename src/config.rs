use anyhow::{Context, Result};
use tracing::warn;

/// Process-wide configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub line: LineConfig,
    pub gemini: GeminiConfig,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Bearer token for the Messaging API reply endpoint.
    pub channel_access_token: String,
    /// HMAC key for webhook signature verification.
    pub channel_secret: String,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// May be empty: startup warns and every generate call fails into the
    /// per-event fallback reply instead.
    pub api_key: String,
    pub model: String,
}

pub fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

pub fn default_port() -> u16 {
    3000
}

/// True unless ENVIRONMENT is set to "production". Controls whether a local
/// .env file is loaded before reading configuration.
pub fn is_development() -> bool {
    std::env::var("ENVIRONMENT")
        .map(|v| v != "production")
        .unwrap_or(true)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let channel_access_token = std::env::var("LINE_CHANNEL_ACCESS_TOKEN")
            .context("LINE_CHANNEL_ACCESS_TOKEN is not set")?;
        let channel_secret =
            std::env::var("LINE_CHANNEL_SECRET").context("LINE_CHANNEL_SECRET is not set")?;

        let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            warn!("GEMINI_API_KEY is not set; generate calls will fail and fall back");
        }

        let model = std::env::var("GEMINI_MODEL")
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(default_model);

        let port = match std::env::var("PORT") {
            Ok(p) => p.parse().context("PORT is not a valid port number")?,
            Err(_) => default_port(),
        };

        Ok(Self {
            line: LineConfig {
                channel_access_token,
                channel_secret,
            },
            gemini: GeminiConfig { api_key, model },
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model() {
        assert_eq!(default_model(), "gemini-1.5-flash");
    }

    #[test]
    fn test_default_port() {
        assert_eq!(default_port(), 3000);
    }
}

use anyhow::{bail, Context, Result};

use crate::refinement::sanitizer::SanitizerConfig;

const DEFAULT_BASE_URL: &str = "https://space.ai-builders.com/backend/v1";
const DEFAULT_MODEL: &str = "gemini-2.5-pro";
const DEFAULT_SCRAPE_MODEL: &str = "supermind-agent-v1";

/// Application configuration loaded from environment variables.
/// Fails at startup if the completion service credential is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub completion_base_url: String,
    pub completion_api_key: String,
    pub default_model: String,
    pub scrape_model: String,
    pub request_timeout_secs: u64,
    pub sanitizer: SanitizerConfig,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let similarity_threshold = parse_env_or("SIMILARITY_THRESHOLD", 0.8_f64)?;
        if !(0.0..=1.0).contains(&similarity_threshold) {
            bail!("SIMILARITY_THRESHOLD must be between 0 and 1, got {similarity_threshold}");
        }

        Ok(Config {
            completion_base_url: std::env::var("COMPLETION_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            completion_api_key: require_env("AI_BUILDER_TOKEN")?,
            default_model: std::env::var("DEFAULT_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            scrape_model: std::env::var("SCRAPE_MODEL")
                .unwrap_or_else(|_| DEFAULT_SCRAPE_MODEL.to_string()),
            request_timeout_secs: parse_env_or("REQUEST_TIMEOUT_SECS", 120)?,
            sanitizer: SanitizerConfig {
                similarity_threshold,
                bullet_slack: parse_env_or("BULLET_SLACK", 2)?,
                ..SanitizerConfig::default()
            },
            port: parse_env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Configuration used by handler tests; never touches the environment.
    pub fn for_tests() -> Self {
        Config {
            completion_base_url: "http://127.0.0.1:0".to_string(),
            completion_api_key: "test-token".to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            scrape_model: DEFAULT_SCRAPE_MODEL.to_string(),
            request_timeout_secs: 5,
            sanitizer: SanitizerConfig::default(),
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

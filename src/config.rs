//! Client configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honoured for local development.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://localhost:5000/api";
const DEFAULT_UPLOAD_URL: &str = "https://api.cloudinary.com/v1_1";
const DEFAULT_UPLOAD_PRESET: &str = "ProfileX";

/// Client configuration, loaded once at process start.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the voting API, without a trailing slash
    pub api_base_url: String,
    /// Base URL of the image upload service
    pub upload_base_url: String,
    /// Cloudinary cloud name that receives verification photos
    pub cloudinary_cloud_name: String,
    /// Unsigned upload preset
    pub cloudinary_upload_preset: String,
    /// How often the live results screen refreshes
    pub live_results_poll_interval: Duration,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    /// Version reported in the device identity string
    pub app_version: String,
    /// Directory holding persisted tokens
    pub token_dir: PathBuf,
}

impl Config {
    /// Offline config for tests only.
    pub fn test_default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000/api".to_string(),
            upload_base_url: "http://127.0.0.1:5001/v1_1".to_string(),
            cloudinary_cloud_name: "test-cloud".to_string(),
            cloudinary_upload_preset: "test-preset".to_string(),
            live_results_poll_interval: Duration::from_secs(30),
            http_timeout: Duration::from_secs(5),
            app_version: "1.0.0".to_string(),
            token_dir: PathBuf::from(".univote-test"),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            api_base_url: trim_base_url(
                env::var("UNIVOTE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            ),
            upload_base_url: trim_base_url(
                env::var("UNIVOTE_CLOUDINARY_URL")
                    .unwrap_or_else(|_| DEFAULT_UPLOAD_URL.to_string()),
            ),
            cloudinary_cloud_name: env::var("UNIVOTE_CLOUDINARY_CLOUD_NAME")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("UNIVOTE_CLOUDINARY_CLOUD_NAME"))?,
            cloudinary_upload_preset: env::var("UNIVOTE_CLOUDINARY_UPLOAD_PRESET")
                .unwrap_or_else(|_| DEFAULT_UPLOAD_PRESET.to_string()),
            live_results_poll_interval: Duration::from_secs(parse_secs(
                "UNIVOTE_LIVE_POLL_SECS",
                30,
            )?),
            http_timeout: Duration::from_secs(parse_secs("UNIVOTE_HTTP_TIMEOUT_SECS", 30)?),
            app_version: env::var("UNIVOTE_APP_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            token_dir: env::var("UNIVOTE_TOKEN_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".univote")),
        })
    }
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_secs(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigError::Invalid(name, raw)),
            Ok(secs) => Ok(secs),
        },
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("UNIVOTE_CLOUDINARY_CLOUD_NAME", " campus-cloud ");
        env::set_var("UNIVOTE_API_URL", "https://vote.example.edu/api/");
        env::remove_var("UNIVOTE_LIVE_POLL_SECS");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.cloudinary_cloud_name, "campus-cloud");
        assert_eq!(config.api_base_url, "https://vote.example.edu/api");
        assert_eq!(config.live_results_poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_secs_rejects_zero() {
        env::set_var("UNIVOTE_TEST_ZERO_SECS", "0");
        assert!(matches!(
            parse_secs("UNIVOTE_TEST_ZERO_SECS", 30),
            Err(ConfigError::Invalid("UNIVOTE_TEST_ZERO_SECS", _))
        ));
        assert_eq!(parse_secs("UNIVOTE_TEST_UNSET_SECS", 12).unwrap(), 12);
    }
}

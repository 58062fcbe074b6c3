//! Configuration management module
//!
//! Loads environment-based configuration for the backend connection,
//! polling intervals and the recommendation endpoint.

use serde::Deserialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default Gemini endpoint used for recommendations
pub const DEFAULT_GENERATIVE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Configuration errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid number format in environment variable {0}")]
    ParseError(&'static str),

    #[error("Environment variable {0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// REST backend settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    /// Base URL including the `/api` prefix
    pub base_url: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Polling interval settings
#[derive(Debug, Clone, Deserialize)]
pub struct PollingSettings {
    /// Interval for the live sensor feed
    pub sensor_interval_ms: u64,
    /// Interval for the monitoring history feed
    pub history_interval_ms: u64,
}

impl PollingSettings {
    pub fn sensor_interval(&self) -> Duration {
        Duration::from_millis(self.sensor_interval_ms)
    }

    pub fn history_interval(&self) -> Duration {
        Duration::from_millis(self.history_interval_ms)
    }
}

/// Generative text endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationSettings {
    pub endpoint: String,
    /// Passed as the `key` query parameter; recommendations fall back when absent
    pub api_key: Option<String>,
}

/// Session identity handed to the data-fetching functions
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionContext {
    /// Bearer token returned by the login endpoint
    pub token: Option<String>,
    /// Identifier of the logged-in user (informational)
    pub user_id: Option<i64>,
}

impl SessionContext {
    pub fn new(token: impl Into<String>, user_id: Option<i64>) -> Self {
        Self {
            token: Some(token.into()),
            user_id,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: ApiSettings,
    pub polling: PollingSettings,
    pub recommendation: RecommendationSettings,
    pub session: SessionContext,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self, SettingsError> {
        let timeout_ms = parse_positive("API_TIMEOUT_MS", "10000")?;
        let sensor_interval_ms = parse_positive("SENSOR_POLL_INTERVAL_MS", "3000")?;
        let history_interval_ms = parse_positive("HISTORY_POLL_INTERVAL_MS", "5000")?;

        let user_id = match env::var("SESSION_USER_ID") {
            Ok(raw) => Some(
                raw.parse()
                    .map_err(|_| SettingsError::ParseError("SESSION_USER_ID"))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            api: ApiSettings {
                base_url: env::var("API_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:5000/api".into()),
                timeout_ms,
            },
            polling: PollingSettings {
                sensor_interval_ms,
                history_interval_ms,
            },
            recommendation: RecommendationSettings {
                endpoint: env::var("GEMINI_API_URL")
                    .unwrap_or_else(|_| DEFAULT_GENERATIVE_URL.into()),
                api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            },
            session: SessionContext {
                token: env::var("SESSION_TOKEN").ok().filter(|t| !t.is_empty()),
                user_id,
            },
        })
    }
}

fn parse_positive(name: &'static str, default: &str) -> Result<u64, SettingsError> {
    let value: u64 = env::var(name)
        .unwrap_or_else(|_| default.into())
        .parse()
        .map_err(|_| SettingsError::ParseError(name))?;

    if value == 0 {
        return Err(SettingsError::ZeroValue(name));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases share process-wide env vars, so they run in one test.
    #[test]
    fn test_settings_from_env() {
        env::remove_var("API_BASE_URL");
        env::remove_var("SENSOR_POLL_INTERVAL_MS");
        env::remove_var("HISTORY_POLL_INTERVAL_MS");
        env::remove_var("GEMINI_API_KEY");

        let settings = Settings::from_env().unwrap();

        assert_eq!(settings.api.base_url, "http://localhost:5000/api");
        assert_eq!(settings.polling.sensor_interval_ms, 3000);
        assert_eq!(settings.polling.history_interval_ms, 5000);
        assert_eq!(settings.recommendation.endpoint, DEFAULT_GENERATIVE_URL);
        assert!(settings.recommendation.api_key.is_none());

        env::set_var("SENSOR_POLL_INTERVAL_MS", "500");
        env::set_var("HISTORY_POLL_INTERVAL_MS", "abc");
        assert!(matches!(
            Settings::from_env(),
            Err(SettingsError::ParseError("HISTORY_POLL_INTERVAL_MS"))
        ));

        env::set_var("HISTORY_POLL_INTERVAL_MS", "0");
        assert!(matches!(
            Settings::from_env(),
            Err(SettingsError::ZeroValue("HISTORY_POLL_INTERVAL_MS"))
        ));

        env::set_var("HISTORY_POLL_INTERVAL_MS", "1000");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.polling.sensor_interval(), Duration::from_millis(500));
        assert_eq!(settings.polling.history_interval(), Duration::from_millis(1000));

        env::remove_var("SENSOR_POLL_INTERVAL_MS");
        env::remove_var("HISTORY_POLL_INTERVAL_MS");
    }
}

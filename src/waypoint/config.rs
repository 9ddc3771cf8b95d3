// SPDX-License-Identifier: MIT

//! Runtime configuration gathered from the environment

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::adk::error::{Result, WaypointError};

pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HOME_CURRENCY: &str = "INR";
pub const DEFAULT_NIGHTLY_RATE: f64 = 100.0;
pub const DEFAULT_NIGHTS: u32 = 5;
pub const DEFAULT_WORKFLOWS_DIR: &str = "workflows";

/// Credentials and base URL for one external API
#[derive(Clone, Default)]
pub struct ApiEndpoint {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Settings shared by CLI, server and node construction.
///
/// Holds API keys, so it does not implement `Debug`.
#[derive(Clone)]
pub struct Config {
    pub model_provider: Option<String>,
    pub model_name: Option<String>,
    pub openai: ApiEndpoint,
    pub groq: ApiEndpoint,
    pub gemini: ApiEndpoint,
    pub openweather: ApiEndpoint,
    pub exchange_rate: ApiEndpoint,
    pub google_places: ApiEndpoint,
    pub output_dir: PathBuf,
    pub workflows_dir: PathBuf,
    pub http_timeout: Duration,
    pub home_currency: String,
    pub nightly_rate: f64,
    pub default_nights: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_provider: None,
            model_name: None,
            openai: ApiEndpoint::default(),
            groq: ApiEndpoint::default(),
            gemini: ApiEndpoint::default(),
            openweather: ApiEndpoint::default(),
            exchange_rate: ApiEndpoint::default(),
            google_places: ApiEndpoint::default(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            workflows_dir: PathBuf::from(DEFAULT_WORKFLOWS_DIR),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            home_currency: DEFAULT_HOME_CURRENCY.to_string(),
            nightly_rate: DEFAULT_NIGHTLY_RATE,
            default_nights: DEFAULT_NIGHTS,
        }
    }
}

impl Config {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let endpoint = |key: &str, url: &str| ApiEndpoint {
            api_key: get(key),
            base_url: get(url),
        };
        let defaults = Self::default();

        Ok(Self {
            model_provider: get("MODEL_PROVIDER"),
            model_name: get("MODEL_NAME"),
            openai: endpoint("OPENAI_API_KEY", "OPENAI_BASE_URL"),
            groq: endpoint("GROQ_API_KEY", "GROQ_BASE_URL"),
            gemini: endpoint("GOOGLE_API_KEY", "GEMINI_BASE_URL"),
            openweather: endpoint("OPENWEATHER_API_KEY", "OPENWEATHER_BASE_URL"),
            exchange_rate: endpoint("EXCHANGE_RATE_API_KEY", "EXCHANGE_RATE_BASE_URL"),
            google_places: endpoint("GOOGLE_PLACES_API_KEY", "GOOGLE_PLACES_BASE_URL"),
            output_dir: get("WAYPOINT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            workflows_dir: get("WAYPOINT_WORKFLOWS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.workflows_dir),
            http_timeout: Duration::from_secs(
                parse_var(&get, "WAYPOINT_HTTP_TIMEOUT_SECS")?
                    .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
            home_currency: get("WAYPOINT_HOME_CURRENCY")
                .map(|c| c.to_uppercase())
                .unwrap_or(defaults.home_currency),
            nightly_rate: parse_var(&get, "WAYPOINT_NIGHTLY_RATE")?.unwrap_or(DEFAULT_NIGHTLY_RATE),
            default_nights: parse_var(&get, "WAYPOINT_DEFAULT_NIGHTS")?.unwrap_or(DEFAULT_NIGHTS),
        })
    }

    /// Shared HTTP client for model and tool calls
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!("waypoint-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(WaypointError::from)
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| WaypointError::config(format!("{} has invalid value '{}'", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.home_currency, "INR");
        assert_eq!(config.nightly_rate, 100.0);
        assert_eq!(config.default_nights, 5);
        assert!(config.openweather.api_key.is_none());
        assert!(config.model_provider.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("MODEL_PROVIDER", "groq"),
            ("OPENWEATHER_API_KEY", "abc"),
            ("OPENWEATHER_BASE_URL", "http://localhost:9000"),
            ("WAYPOINT_OUTPUT_DIR", "/tmp/reports"),
            ("WAYPOINT_HTTP_TIMEOUT_SECS", "5"),
            ("WAYPOINT_HOME_CURRENCY", "eur"),
            ("WAYPOINT_NIGHTLY_RATE", "80.5"),
            ("WAYPOINT_DEFAULT_NIGHTS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.model_provider.as_deref(), Some("groq"));
        assert_eq!(config.openweather.api_key.as_deref(), Some("abc"));
        assert_eq!(
            config.openweather.base_url.as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(config.output_dir, PathBuf::from("/tmp/reports"));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.home_currency, "EUR");
        assert_eq!(config.nightly_rate, 80.5);
        assert_eq!(config.default_nights, 3);
    }

    #[test]
    fn test_blank_values_are_absent() {
        let config = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "   ")])).unwrap();
        assert!(config.openai.api_key.is_none());
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let result = Config::from_lookup(lookup(&[("WAYPOINT_DEFAULT_NIGHTS", "five")]));
        match result {
            Err(WaypointError::Config(msg)) => assert!(msg.contains("WAYPOINT_DEFAULT_NIGHTS")),
            other => panic!("expected config error, got {:?}", other.err()),
        }
    }
}

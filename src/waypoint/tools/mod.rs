// SPDX-License-Identifier: MIT

//! HTTP-backed tools for the travel branch

pub mod exchange;
pub mod places;
pub mod weather;

use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::adk::error::WaypointError;
use crate::adk::tool::Tool;
use crate::waypoint::config::{ApiEndpoint, Config};
use crate::waypoint::workflow::registry::ToolRegistry;

pub use exchange::ExchangeRateTool;
pub use places::PlacesSearchTool;
pub use weather::WeatherTool;

/// Register every tool whose API key is configured.
///
/// Tools without a key are skipped with a warning; nodes using them fall
/// back to their configured defaults.
pub async fn register_builtin_tools(registry: &ToolRegistry, config: &Config, client: &Client) {
    let candidates: Vec<Result<Arc<dyn Tool>, WaypointError>> = vec![
        WeatherTool::new(client.clone(), &config.openweather).map(|t| Arc::new(t) as Arc<dyn Tool>),
        PlacesSearchTool::new(client.clone(), &config.google_places)
            .map(|t| Arc::new(t) as Arc<dyn Tool>),
        ExchangeRateTool::new(client.clone(), &config.exchange_rate)
            .map(|t| Arc::new(t) as Arc<dyn Tool>),
    ];

    for candidate in candidates {
        match candidate {
            Ok(tool) => {
                log::info!("Registered tool: {}", tool.name());
                registry.register(tool).await;
            }
            Err(e) => log::warn!("Tool not registered: {}", e),
        }
    }
}

fn api_key(endpoint: &ApiEndpoint, var: &str) -> Result<String, WaypointError> {
    endpoint
        .api_key
        .clone()
        .ok_or_else(|| WaypointError::config(format!("{} must be set", var)))
}

fn base_url(endpoint: &ApiEndpoint, default: &str) -> String {
    endpoint
        .base_url
        .clone()
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn parse_url(raw: &str) -> Result<Url, WaypointError> {
    Url::parse(raw).map_err(|e| WaypointError::config(format!("invalid URL '{}': {}", raw, e)))
}

/// GET a JSON document, turning non-success statuses into `Api` errors
async fn get_json(client: &Client, url: Url, provider: &str) -> Result<Value, WaypointError> {
    log::debug!("{} request: {}", provider, url.path());
    let resp = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| {
                body.get("message")
                    .or_else(|| body.get("error-type"))
                    .or_else(|| body.get("error_message"))
                    .and_then(|m| m.as_str().map(str::to_string))
            })
            .unwrap_or(text);
        return Err(WaypointError::api(
            provider,
            format!("status {}: {}", status.as_u16(), message),
        ));
    }

    Ok(resp.json().await?)
}
